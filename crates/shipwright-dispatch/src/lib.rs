//! Shipwright build dispatcher
//!
//! Fans per-chain job lists out to a bounded worker pool in a fair order,
//! tracks in-flight scratch directories for interrupt-safe cleanup, and
//! aggregates job failures instead of aborting unrelated builds.

pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod tracker;

pub use dispatcher::{DispatchSummary, Dispatcher, SCRATCH_PREFIX};
pub use error::{DispatchError, JobFailure, Result};
pub use queue::{ClaimCursor, JobQueue};
pub use tracker::TempResourceTracker;
