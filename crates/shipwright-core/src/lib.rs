//! Shipwright core domain
//!
//! Chain definitions, build jobs, image tag rules, Go toolchain resolution and
//! the collaborator traits shared by the dispatcher and the build engines.

pub mod builder;
pub mod chain;
pub mod error;
pub mod go_versions;
pub mod gomod;
pub mod job;
pub mod loader;
pub mod settings;
pub mod tag;

pub use builder::{BuildRequest, ContextRenderer, ImageBuilder, RenderedBuild, SCRATCH_PREFIX};
pub use chain::{ChainNodeConfig, DockerfileType};
pub use error::{CoreError, Result};
pub use go_versions::GoVersion;
pub use gomod::GoMod;
pub use job::{BuildJob, ChainJobList};
pub use loader::{find_chain, find_chains_path, load_chains, parse_chains};
pub use settings::BuildSettings;
