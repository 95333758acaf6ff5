//! Port definitions (trait abstractions) for external systems.
//!
//! The provisioner and the service installer hold their side effects behind
//! these traits so their state machines can be exercised against in-memory
//! fakes. Concrete adapters live in `reviewlens-runtime`.
//!
//! # Design Rules
//!
//! - No adapter-specific types (`reqwest`, `sysinfo`, `tokio::process`) in signatures
//! - Errors are domain-specific via `thiserror`
//! - Progress is reported through borrowed callbacks, never channels

mod environment;
mod markers;
mod service;

pub use environment::{
    DiskSpaceProbe, EnvError, IsolatedEnvironment, RuntimeProvider, RuntimeReport, RuntimeStep,
};
pub use markers::{MarkerInfo, MarkerState, MarkerStore};
pub use service::{ServiceApi, ServiceError, ServicePlatform, ServiceReport};

/// Borrowed line sink for streamed subprocess output.
pub type LineSink<'a> = &'a (dyn Fn(&str) + Send + Sync);
