//! Typed helpers for the worker's command vocabulary.

use std::path::Path;

use reviewlens_core::{PhaseContext, phase_name};
use serde_json::Value;

use super::WorkerBridge;
use crate::error::BridgeError;
use crate::protocol::{WorkerCommand, WorkerResponse};

impl WorkerBridge {
    async fn call(&self, command: WorkerCommand) -> Result<WorkerResponse, BridgeError> {
        self.execute(command).await?.into_result()
    }

    /// Liveness check; the worker answers `{success, message:"pong", status}`.
    pub async fn ping(&self) -> Result<WorkerResponse, BridgeError> {
        self.call(WorkerCommand::new("ping")).await
    }

    /// Run one pipeline phase with the phase context set for its duration.
    pub async fn run_phase(
        &self,
        phase: u32,
        config: Option<Value>,
    ) -> Result<WorkerResponse, BridgeError> {
        let name = phase_name(phase).ok_or(BridgeError::UnknownPhase(phase))?;
        let _phase = self.enter_phase(PhaseContext::new(phase, name));

        let mut command = WorkerCommand::new("run_phase").with("phase", phase);
        if let Some(config) = config {
            command = command.with("config", config);
        }
        self.call(command).await
    }

    /// Ask the worker to stop the running pipeline.
    pub async fn stop_pipeline(&self) -> Result<WorkerResponse, BridgeError> {
        self.call(WorkerCommand::new("stop")).await
    }

    pub async fn get_status(&self) -> Result<WorkerResponse, BridgeError> {
        self.call(WorkerCommand::new("get_status")).await
    }

    pub async fn set_output_dir(&self, dir: &Path) -> Result<WorkerResponse, BridgeError> {
        self.call(
            WorkerCommand::new("set_output_dir").with("output_dir", dir.to_string_lossy().into_owned()),
        )
        .await
    }

    pub async fn validate_dataset(&self, path: &Path) -> Result<WorkerResponse, BridgeError> {
        self.call(WorkerCommand::new("validate_dataset").with("path", path.to_string_lossy().into_owned()))
            .await
    }

    pub async fn get_llm_info(&self) -> Result<WorkerResponse, BridgeError> {
        self.call(WorkerCommand::new("get_llm_info")).await
    }

    pub async fn check_ollama(&self) -> Result<WorkerResponse, BridgeError> {
        self.call(WorkerCommand::new("check_ollama")).await
    }

    pub async fn check_models_status(&self) -> Result<WorkerResponse, BridgeError> {
        self.call(WorkerCommand::new("check_models_status")).await
    }

    /// Download the worker's local models. Per-model progress arrives as
    /// `model_download` progress events.
    pub async fn download_models(&self) -> Result<WorkerResponse, BridgeError> {
        self.call(WorkerCommand::new("download_models")).await
    }

    /// Load the worker's models into memory (`model_preload` progress).
    pub async fn preload_models(&self) -> Result<WorkerResponse, BridgeError> {
        self.call(WorkerCommand::new("preload_models")).await
    }
}
