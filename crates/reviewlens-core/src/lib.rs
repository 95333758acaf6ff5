//! Core domain types and port definitions for reviewlens.
//!
//! This crate is pure: it owns the data model shared by the worker bridge and
//! the installers (progress events, installation states, model records), the
//! worker settings, path resolution, and the traits that platform-specific
//! adapters in `reviewlens-runtime` implement.

pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod settings;
pub mod utils;

pub use domain::{ModelRecord, PIPELINE_PHASES, phase_name};
pub use events::{
    InferenceInstallState, InstallationState, PhaseContext, ProgressEvent, ServicePhase,
    ServiceStage, SetupStage,
};
pub use paths::{PathError, PythonEnvLayout, data_root, resource_root};
pub use settings::{LlmMode, SettingsError, WorkerSettings};
