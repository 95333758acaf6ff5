//! Event and state types reported by the worker bridge and the installers.

mod progress;
mod service;
mod setup;

pub use progress::{PhaseContext, ProgressEvent};
pub use service::{InferenceInstallState, ServicePhase, ServiceStage, unified_progress};
pub use setup::{InstallationState, SetupStage};
