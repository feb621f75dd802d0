//! Shipwright image build engines
//!
//! This crate renders per-chain Dockerfiles and build arguments into a job's
//! scratch directory, packs build contexts, and builds images either through
//! the Docker Engine API or `docker buildx`, pushing to a registry on request.

pub mod auth;
pub mod buildx;
pub mod context;
pub mod daemon;
pub mod error;
pub mod gomod;
pub mod pusher;
pub mod renderer;
pub mod templates;

pub use auth::RegistryAuth;
pub use buildx::BuildxBuilder;
pub use context::ContextBuilder;
pub use daemon::DaemonBuilder;
pub use error::{BuildError, BuildResult};
pub use gomod::GoModFetcher;
pub use pusher::{ImagePusher, split_image_tag};
pub use renderer::TemplateRenderer;
pub use templates::DockerfileTemplate;
