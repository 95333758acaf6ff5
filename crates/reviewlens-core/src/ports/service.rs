//! Ports for the local inference service.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use super::LineSink;
use crate::domain::ModelRecord;
use crate::events::ServiceStage;

/// Errors from installing, running or querying the inference service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Inference service is not installed")]
    NotInstalled,

    #[error("Inference service installation failed: {0}")]
    Install(String),

    #[error("Failed to start inference service: {0}")]
    Start(String),

    #[error("Inference service did not become healthy within {secs}s")]
    HealthTimeout { secs: u64 },

    #[error("Inference service request failed: {0}")]
    Http(String),

    #[error("Failed to pull model {model}: {reason}")]
    Pull { model: String, reason: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Removing the model would leave the service with no models.
    #[error("Cannot delete {0}: it is the only installed model")]
    LastModel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Callback for software-phase progress.
pub type ServiceReport<'a> = &'a (dyn Fn(ServiceStage, u8, &str) + Send + Sync);

/// Platform-specific installation and process control for the service.
#[async_trait]
pub trait ServicePlatform: Send + Sync {
    /// The installed service binary, if any.
    fn locate_binary(&self) -> Option<PathBuf>;

    /// Download and install the service, returning the binary path.
    async fn install(&self, report: ServiceReport<'_>) -> Result<PathBuf, ServiceError>;

    /// Start the service detached from this process.
    async fn start(&self, binary: &Path) -> Result<(), ServiceError>;

    /// Stop any running service process.
    async fn stop(&self) -> Result<(), ServiceError>;

    /// Directories and files removed on uninstall.
    fn removable_paths(&self) -> Vec<PathBuf>;

    /// Remove PATH or other environment registrations.
    async fn unregister(&self) -> Result<(), ServiceError>;
}

/// The running service's HTTP API and model puller.
#[async_trait]
pub trait ServiceApi: Send + Sync {
    async fn is_healthy(&self) -> bool;

    async fn list_models(&self) -> Result<Vec<ModelRecord>, ServiceError>;

    async fn delete_model(&self, name: &str) -> Result<(), ServiceError>;

    /// Pull a model, streaming each output line (split on `\r` and `\n`).
    async fn pull_model(
        &self,
        binary: &Path,
        name: &str,
        on_line: LineSink<'_>,
    ) -> Result<(), ServiceError>;
}
