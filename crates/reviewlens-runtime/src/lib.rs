//! Platform adapters and installers for reviewlens.
//!
//! - [`provision`]: the staged environment provisioner and its adapters
//!   (markers on disk, disk-space probe, virtual environment, runtime
//!   acquisition)
//! - [`service`]: the local inference service installer, its HTTP client and
//!   platform integration
//! - [`cleanup`]: best-effort removal of everything the installers created

pub mod archive;
pub mod cleanup;
pub mod download;
mod process;
pub mod provision;
pub mod service;

pub use cleanup::{CleanupTargets, DetectedResources, RemovalReport, UninstallCoordinator};
pub use provision::{EnvironmentProvisioner, ProvisionConfig, ProvisionError};
pub use service::{InferenceInstaller, OllamaApi, OllamaPlatform, ServiceConfig};
