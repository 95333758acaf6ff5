use serde::{Deserialize, Serialize};

/// Which half of the unified inference-service install is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServicePhase {
    Software,
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceStage {
    Checking,
    Downloading,
    Extracting,
    Starting,
    PullingModel,
    Verifying,
    Complete,
    Error,
}

/// Snapshot reported to the service installer's progress callback.
///
/// `unified_progress` spans both phases: software maps to `0..=50`, model to
/// `50..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceInstallState {
    pub stage: ServiceStage,
    pub progress: u8,
    pub unified_progress: u8,
    pub current_phase: ServicePhase,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InferenceInstallState {
    pub fn new(
        phase: ServicePhase,
        stage: ServiceStage,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        let progress = progress.min(100);
        Self {
            stage,
            progress,
            unified_progress: unified_progress(phase, progress),
            current_phase: phase,
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(phase: ServicePhase, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(phase, ServiceStage::Error, 0, message)
        }
    }

    /// Both phases satisfied.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(ServicePhase::Model, ServiceStage::Complete, 100, message)
    }
}

/// Map a per-phase percentage onto the unified `0..=100` scale.
pub const fn unified_progress(phase: ServicePhase, progress: u8) -> u8 {
    let progress = if progress > 100 { 100 } else { progress };
    match phase {
        ServicePhase::Software => progress / 2,
        ServicePhase::Model => 50 + progress / 2,
    }
}
