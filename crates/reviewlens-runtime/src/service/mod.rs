//! Local inference service installer.
//!
//! The service binary and a model are two separately installable units that
//! share one lifecycle: the service only counts as ready when both exist.
//! Progress for the two halves is reported on one unified `0..=100` scale
//! (software first, model second).

mod client;
mod health;
mod platform;
mod pull_progress;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reviewlens_core::ports::{ServiceApi, ServiceError, ServicePlatform};
use reviewlens_core::{InferenceInstallState, ModelRecord, ServicePhase, ServiceStage};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::cleanup::{RemovalReport, remove_path};

pub use client::{DEFAULT_BASE_URL, OllamaApi};
pub use health::wait_for_health;
pub use platform::OllamaPlatform;
pub use pull_progress::{PullUpdate, parse_pull_line};

/// Callback receiving every install state.
pub type InstallReport<'a> = &'a (dyn Fn(InferenceInstallState) + Send + Sync);

/// Health polling window after starting the service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    pub health_interval: Duration,
    pub health_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(1),
            health_timeout: Duration::from_secs(30),
        }
    }
}

/// Installs the service, pulls models and guards model deletion.
pub struct InferenceInstaller {
    platform: Arc<dyn ServicePlatform>,
    api: Arc<dyn ServiceApi>,
    config: ServiceConfig,
    /// Serializes the list-then-delete sequence of [`Self::delete_model`].
    delete_lock: Mutex<()>,
}

impl InferenceInstaller {
    pub fn new(
        platform: Arc<dyn ServicePlatform>,
        api: Arc<dyn ServiceApi>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            platform,
            api,
            config,
            delete_lock: Mutex::new(()),
        }
    }

    /// Install the service binary if missing, then start it and wait for
    /// it to answer.
    ///
    /// Returns immediately when the binary is already present.
    pub async fn install(&self, report: InstallReport<'_>) -> Result<PathBuf, ServiceError> {
        let software = |stage: ServiceStage, progress: u8, message: &str| {
            report(InferenceInstallState::new(
                ServicePhase::Software,
                stage,
                progress,
                message,
            ));
        };

        software(ServiceStage::Checking, 0, "Checking for inference service");
        if let Some(binary) = self.platform.locate_binary() {
            debug!(binary = %binary.display(), "Inference service already installed");
            software(ServiceStage::Checking, 100, "Inference service already installed");
            return Ok(binary);
        }

        let binary = self.platform.install(&software).await?;

        software(ServiceStage::Starting, 90, "Starting inference service");
        self.platform.start(&binary).await?;
        wait_for_health(
            self.api.as_ref(),
            self.config.health_interval,
            self.config.health_timeout,
        )
        .await?;

        info!(binary = %binary.display(), "Inference service installed");
        software(ServiceStage::Starting, 100, "Inference service running");
        Ok(binary)
    }

    /// Install the service and make sure `model` is available.
    ///
    /// With both already in place this reports completion and does nothing
    /// else.
    pub async fn install_with_model(
        &self,
        model: &str,
        report: InstallReport<'_>,
    ) -> Result<(), ServiceError> {
        if self.is_satisfied(model).await {
            info!(%model, "Inference service and model already installed");
            report(InferenceInstallState::complete("Inference service ready"));
            return Ok(());
        }

        let binary = self.install(report).await?;
        self.ensure_running(&binary).await?;

        let model_state = |stage: ServiceStage, progress: u8, message: &str| {
            report(InferenceInstallState::new(
                ServicePhase::Model,
                stage,
                progress,
                message,
            ));
        };

        model_state(ServiceStage::Checking, 0, "Checking installed models");
        if self.find_model(model).await?.is_some() {
            report(InferenceInstallState::complete("Inference service ready"));
            return Ok(());
        }

        // Below any real value so the 0% manifest line is reported.
        let last = AtomicI16::new(-1);
        let on_line = |line: &str| {
            debug!(target: "reviewlens::pull", "{line}");
            let Some(update) = parse_pull_line(line) else {
                return;
            };
            // Layers download one after another; keep the bar monotonic.
            let progress = i16::from(update.progress);
            if last.fetch_max(progress, Ordering::Relaxed) < progress {
                model_state(update.stage, update.progress, &update.message);
            }
        };
        model_state(ServiceStage::PullingModel, 0, &format!("Pulling {model}"));
        self.api.pull_model(&binary, model, &on_line).await?;

        model_state(ServiceStage::Verifying, 99, "Verifying model");
        if self.find_model(model).await?.is_none() {
            return Err(ServiceError::Pull {
                model: model.to_string(),
                reason: "model not listed after pull".to_string(),
            });
        }

        info!(%model, "Model installed");
        report(InferenceInstallState::complete("Inference service ready"));
        Ok(())
    }

    /// Run [`Self::install_with_model`] (or [`Self::install`] without a
    /// model), reporting failure as an error state.
    pub async fn setup(&self, model: Option<&str>, report: InstallReport<'_>) -> bool {
        let in_model_phase = AtomicBool::new(false);
        let tracking = |state: InferenceInstallState| {
            in_model_phase.store(state.current_phase == ServicePhase::Model, Ordering::Relaxed);
            report(state);
        };

        let result = match model {
            Some(model) => self.install_with_model(model, &tracking).await,
            None => self.install(&tracking).await.map(drop),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Inference service setup failed");
                let phase = if in_model_phase.load(Ordering::Relaxed) {
                    ServicePhase::Model
                } else {
                    ServicePhase::Software
                };
                report(InferenceInstallState::failed(
                    phase,
                    "Inference service setup failed",
                    e.to_string(),
                ));
                false
            }
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelRecord>, ServiceError> {
        self.api.list_models().await
    }

    /// Delete `name`, refusing when it is the only installed model.
    pub async fn delete_model(&self, name: &str) -> Result<(), ServiceError> {
        let _guard = self.delete_lock.lock().await;

        let models = self.api.list_models().await?;
        let target = models
            .iter()
            .find(|m| m.matches(name))
            .ok_or_else(|| ServiceError::ModelNotFound(name.to_string()))?;

        if models.len() <= 1 {
            warn!(model = %target.name, "Refusing to delete the only installed model");
            return Err(ServiceError::LastModel(target.name.clone()));
        }

        self.api.delete_model(&target.name).await
    }

    /// Stop the service and remove its files and PATH registration.
    ///
    /// Every step runs even when an earlier one failed.
    pub async fn uninstall(&self) -> RemovalReport {
        let mut report = RemovalReport::default();

        if let Err(e) = self.platform.stop().await {
            warn!(error = %e, "Failed to stop inference service");
            report.failures.push(format!("stop service: {e}"));
        }

        for path in self.platform.removable_paths() {
            remove_path(&path, &mut report).await;
        }

        if let Err(e) = self.platform.unregister().await {
            warn!(error = %e, "Failed to remove PATH registration");
            report.failures.push(format!("PATH registration: {e}"));
        }

        info!(
            removed = report.removed.len(),
            failures = report.failures.len(),
            "Inference service uninstalled"
        );
        report
    }

    async fn is_satisfied(&self, model: &str) -> bool {
        if self.platform.locate_binary().is_none() || !self.api.is_healthy().await {
            return false;
        }
        matches!(self.find_model(model).await, Ok(Some(_)))
    }

    async fn find_model(&self, model: &str) -> Result<Option<ModelRecord>, ServiceError> {
        let models = self.api.list_models().await?;
        Ok(models.into_iter().find(|m| m.matches(model)))
    }

    /// Start an installed but stopped service.
    async fn ensure_running(&self, binary: &Path) -> Result<(), ServiceError> {
        if self.api.is_healthy().await {
            return Ok(());
        }
        info!("Inference service not running, starting it");
        self.platform.start(binary).await?;
        wait_for_health(
            self.api.as_ref(),
            self.config.health_interval,
            self.config.health_timeout,
        )
        .await
    }
}
