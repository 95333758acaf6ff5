//! Ports for the managed runtime and the isolated dependency environment.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use super::LineSink;

/// Errors raised by runtime and environment adapters.
#[derive(Debug, Error)]
pub enum EnvError {
    /// No usable runtime could be found or acquired.
    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Creating the isolated environment failed.
    #[error("Failed to create isolated environment at {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// The dependency installer exited unsuccessfully.
    #[error("Dependency installation failed: {0}")]
    InstallFailed(String),

    /// The validation script did not succeed.
    #[error("Environment validation failed: {0}")]
    ValidationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Sub-steps of runtime acquisition, reported with a 0-100 percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStep {
    Downloading,
    Installing,
}

/// Callback for runtime acquisition progress.
pub type RuntimeReport<'a> = &'a (dyn Fn(RuntimeStep, u8, &str) + Send + Sync);

/// Locates or installs the base runtime that hosts the isolated environment.
///
/// One implementation per platform family, selected at construction time.
#[async_trait]
pub trait RuntimeProvider: Send + Sync {
    /// Return a suitable runtime interpreter that is already installed.
    async fn detect(&self) -> Option<PathBuf>;

    /// Acquire a runtime and return its interpreter path.
    async fn acquire(&self, report: RuntimeReport<'_>) -> Result<PathBuf, EnvError>;
}

/// The isolated environment holding the worker's dependencies.
#[async_trait]
pub trait IsolatedEnvironment: Send + Sync {
    fn exists(&self) -> bool;

    async fn create(&self, base_runtime: &Path) -> Result<(), EnvError>;

    /// Delete the environment. Succeeds if it does not exist.
    async fn remove(&self) -> Result<(), EnvError>;

    /// Install the fixed dependency manifest, streaming installer output lines.
    async fn install_dependencies(&self, on_line: LineSink<'_>) -> Result<(), EnvError>;

    /// Import every required library and exercise it.
    async fn validate(&self) -> Result<(), EnvError>;
}

/// Free-space lookup for the volume holding a path.
pub trait DiskSpaceProbe: Send + Sync {
    /// Available bytes, or `None` if the volume cannot be determined.
    fn available_bytes(&self, path: &Path) -> Option<u64>;
}
