use serde::{Deserialize, Serialize};

/// Stages of the environment provisioner, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetupStage {
    Checking,
    DownloadingRuntime,
    InstallingRuntime,
    CreatingIsolatedEnv,
    InstallingDeps,
    Complete,
    Error,
}

impl SetupStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::DownloadingRuntime => "downloading-runtime",
            Self::InstallingRuntime => "installing-runtime",
            Self::CreatingIsolatedEnv => "creating-isolated-env",
            Self::InstallingDeps => "installing-deps",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// Snapshot reported to the provisioner's progress callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationState {
    pub stage: SetupStage,
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstallationState {
    pub fn new(stage: SetupStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
            error: None,
        }
    }

    /// Terminal failure state carrying the root cause.
    pub fn failed(progress: u8, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            stage: SetupStage::Error,
            progress: progress.min(100),
            message: message.into(),
            error: Some(error.into()),
        }
    }
}
