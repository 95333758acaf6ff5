use serde::{Deserialize, Serialize};

/// A progress notification from the worker.
///
/// Structured progress arrives on the worker's output stream as
/// `{"type":"progress", ...}`; free-text progress parsed from the diagnostic
/// stream is converted into the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "progress", rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(default)]
    pub phase: Option<u32>,
    #[serde(default)]
    pub phase_name: Option<String>,
    /// Percentage; `-1` signals an asset-level failure.
    pub progress: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Present on asset-level progress (`model_download`, `model_preload`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProgressEvent {
    /// Phase progress attributed to `context`.
    pub fn for_phase(context: &PhaseContext, progress: i32, message: impl Into<String>) -> Self {
        Self {
            phase: Some(context.phase),
            phase_name: Some(context.name.clone()),
            progress,
            message: Some(message.into()),
            subtype: None,
            model: None,
        }
    }

    /// Whether this is a phase completion signal (100 with no subtype).
    pub fn is_phase_completion(&self) -> bool {
        self.subtype.is_none() && self.progress == 100
    }

    /// Fill in phase fields the worker left out.
    #[must_use]
    pub fn with_context(mut self, context: &PhaseContext) -> Self {
        if self.phase.is_none() {
            self.phase = Some(context.phase);
        }
        if self.phase_name.is_none() {
            self.phase_name = Some(context.name.clone());
        }
        self
    }
}

/// The phase currently being executed by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseContext {
    pub phase: u32,
    pub name: String,
}

impl PhaseContext {
    pub fn new(phase: u32, name: impl Into<String>) -> Self {
        Self {
            phase,
            name: name.into(),
        }
    }
}
