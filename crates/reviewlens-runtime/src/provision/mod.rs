//! Staged provisioning of the worker's isolated environment.
//!
//! The provisioner walks `checking → (downloading-runtime → installing-runtime)?
//! → creating-isolated-env → installing-deps → complete`, reporting an
//! [`InstallationState`] at every step. Side effects go through the ports in
//! `reviewlens_core::ports`, so the state machine itself never touches the
//! filesystem or spawns processes directly.

mod disk;
mod markers;
mod pip_progress;
pub mod runtime;
mod venv;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reviewlens_core::ports::{
    DiskSpaceProbe, EnvError, IsolatedEnvironment, MarkerInfo, MarkerState, MarkerStore,
    RuntimeProvider, RuntimeStep,
};
use reviewlens_core::{InstallationState, PythonEnvLayout, SetupStage};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub use disk::SysinfoDiskProbe;
pub use markers::FsMarkerStore;
pub use pip_progress::PipProgress;
pub use runtime::default_runtime_provider;
pub use venv::VenvEnvironment;

/// Callback receiving every provisioning state.
pub type SetupReport<'a> = &'a (dyn Fn(InstallationState) + Send + Sync);

const GIB: u64 = 1024 * 1024 * 1024;

/// Free space required on the target volume before anything is installed.
pub const MIN_FREE_BYTES: u64 = 5 * GIB;

/// Dependency installation attempts before giving up.
pub const INSTALL_ATTEMPTS: u32 = 3;

/// Delay between dependency installation attempts.
pub const INSTALL_RETRY_DELAY: Duration = Duration::from_secs(5);

// Progress bands per stage.
const RUNTIME_DOWNLOAD_BAND: (u8, u8) = (5, 15);
const RUNTIME_INSTALL_BAND: (u8, u8) = (15, 25);
const CREATE_ENV_PROGRESS: u8 = 25;
const DEPS_BAND: (u8, u8) = (35, 90);
const FINAL_VALIDATION_PROGRESS: u8 = 95;

// =============================================================================
// Configuration and errors
// =============================================================================

/// Tunables for a provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub min_free_bytes: u64,
    pub install_attempts: u32,
    pub retry_delay: Duration,
    /// Directory whose volume must have `min_free_bytes` available.
    pub target_dir: PathBuf,
    /// Directories created before the final commit.
    pub output_dirs: Vec<PathBuf>,
}

impl ProvisionConfig {
    pub fn for_layout(layout: &PythonEnvLayout) -> Self {
        Self {
            min_free_bytes: MIN_FREE_BYTES,
            install_attempts: INSTALL_ATTEMPTS,
            retry_delay: INSTALL_RETRY_DELAY,
            target_dir: layout.data_root().to_path_buf(),
            output_dirs: layout.output_dirs(),
        }
    }
}

/// Reasons a provisioning run stops.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(
        "Not enough free disk space in {}: {:.1} GB available, {:.1} GB required. Free up space and retry.",
        .path.display(),
        gib(.available),
        gib(.required)
    )]
    InsufficientDisk {
        path: PathBuf,
        available: u64,
        required: u64,
    },

    #[error("Could not obtain a Python runtime: {0}")]
    Runtime(#[source] EnvError),

    #[error("Could not create the isolated environment: {0}")]
    CreateEnv(#[source] EnvError),

    #[error("Dependency installation failed after {attempts} attempts: {source}")]
    Install { attempts: u32, source: EnvError },

    #[error("The installed environment failed validation: {0}")]
    Validation(#[source] EnvError),

    #[error("Failed to write install markers: {0}")]
    Markers(#[source] io::Error),

    #[error("Failed to create output directory {}: {reason}", .path.display())]
    OutputDir { path: PathBuf, reason: String },
}

#[allow(clippy::cast_precision_loss)]
fn gib(bytes: &u64) -> f64 {
    *bytes as f64 / GIB as f64
}

/// Map a sub-step percentage onto a stage's progress band.
fn scale(band: (u8, u8), percent: u8) -> u8 {
    let (lo, hi) = band;
    let span = u16::from(hi - lo) * u16::from(percent.min(100)) / 100;
    u8::try_from(u16::from(lo) + span).unwrap_or(hi)
}

// =============================================================================
// Provisioner
// =============================================================================

/// Drives the isolated environment from nothing to a validated, committed
/// install.
///
/// Only one run should be active at a time; the markers are the only state
/// shared between runs.
pub struct EnvironmentProvisioner {
    runtime: Arc<dyn RuntimeProvider>,
    env: Arc<dyn IsolatedEnvironment>,
    disk: Arc<dyn DiskSpaceProbe>,
    markers: Arc<dyn MarkerStore>,
    config: ProvisionConfig,
}

impl EnvironmentProvisioner {
    pub fn new(
        runtime: Arc<dyn RuntimeProvider>,
        env: Arc<dyn IsolatedEnvironment>,
        disk: Arc<dyn DiskSpaceProbe>,
        markers: Arc<dyn MarkerStore>,
        config: ProvisionConfig,
    ) -> Self {
        Self {
            runtime,
            env,
            disk,
            markers,
            config,
        }
    }

    /// Provisioner wired to the real platform adapters for `layout`.
    pub fn for_layout(layout: &PythonEnvLayout) -> Self {
        Self::new(
            default_runtime_provider(layout),
            Arc::new(VenvEnvironment::new(layout.venv_dir())),
            Arc::new(SysinfoDiskProbe),
            Arc::new(FsMarkerStore::for_layout(layout)),
            ProvisionConfig::for_layout(layout),
        )
    }

    /// Durable install state as recorded by the markers.
    pub fn state(&self) -> MarkerState {
        self.markers.state()
    }

    /// Whether a committed environment is present on disk.
    pub fn is_ready(&self) -> bool {
        self.markers.state() == MarkerState::Complete && self.env.exists()
    }

    /// Run provisioning, reporting failure as an error state.
    ///
    /// Returns `true` once the environment is committed.
    pub async fn setup(&self, report: SetupReport<'_>) -> bool {
        let last_progress = AtomicU8::new(0);
        let tracking = |state: InstallationState| {
            last_progress.store(state.progress, Ordering::Relaxed);
            report(state);
        };

        match self.run(&tracking).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Environment setup failed");
                report(InstallationState::failed(
                    last_progress.load(Ordering::Relaxed),
                    "Environment setup failed",
                    e.to_string(),
                ));
                false
            }
        }
    }

    /// Run provisioning, returning the first error.
    pub async fn run(&self, report: SetupReport<'_>) -> Result<(), ProvisionError> {
        report(InstallationState::new(
            SetupStage::Checking,
            0,
            "Checking system requirements",
        ));
        self.check_disk_space()?;

        match self.markers.state() {
            MarkerState::Complete => {
                if self.env.exists() && self.env.validate().await.is_ok() {
                    self.ensure_output_dirs()?;
                    info!("Environment already provisioned");
                    report(InstallationState::new(
                        SetupStage::Complete,
                        100,
                        "Environment ready",
                    ));
                    return Ok(());
                }
                warn!("Committed environment failed validation, reinstalling");
                self.discard().await?;
            }
            MarkerState::InProgress => {
                warn!("Previous installation was interrupted, starting over");
                self.discard().await?;
            }
            MarkerState::Absent => {}
        }

        let base_runtime = self.acquire_runtime(report).await?;

        self.markers
            .begin(&MarkerInfo::current())
            .map_err(ProvisionError::Markers)?;

        if self.env.exists() {
            debug!("Removing stale isolated environment");
            self.env.remove().await.map_err(ProvisionError::CreateEnv)?;
        }
        report(InstallationState::new(
            SetupStage::CreatingIsolatedEnv,
            CREATE_ENV_PROGRESS,
            "Creating isolated environment",
        ));
        self.env
            .create(&base_runtime)
            .await
            .map_err(ProvisionError::CreateEnv)?;

        self.install_with_retry(report).await?;

        report(InstallationState::new(
            SetupStage::InstallingDeps,
            DEPS_BAND.1,
            "Validating installation",
        ));
        self.env.validate().await.map_err(ProvisionError::Validation)?;

        self.ensure_output_dirs()?;
        report(InstallationState::new(
            SetupStage::InstallingDeps,
            FINAL_VALIDATION_PROGRESS,
            "Finalizing installation",
        ));
        self.env.validate().await.map_err(ProvisionError::Validation)?;

        self.markers
            .commit(&MarkerInfo::current())
            .map_err(ProvisionError::Markers)?;

        info!("Environment provisioned");
        report(InstallationState::new(
            SetupStage::Complete,
            100,
            "Environment ready",
        ));
        Ok(())
    }

    fn check_disk_space(&self) -> Result<(), ProvisionError> {
        let path = &self.config.target_dir;
        match self.disk.available_bytes(path) {
            Some(available) if available < self.config.min_free_bytes => {
                Err(ProvisionError::InsufficientDisk {
                    path: path.clone(),
                    available,
                    required: self.config.min_free_bytes,
                })
            }
            Some(available) => {
                debug!(available, "Disk space check passed");
                Ok(())
            }
            None => {
                warn!(path = %path.display(), "Could not determine free disk space, continuing");
                Ok(())
            }
        }
    }

    /// Drop the environment and both markers so the next steps start clean.
    async fn discard(&self) -> Result<(), ProvisionError> {
        self.env.remove().await.map_err(ProvisionError::CreateEnv)?;
        self.markers.reset().map_err(ProvisionError::Markers)
    }

    async fn acquire_runtime(&self, report: SetupReport<'_>) -> Result<PathBuf, ProvisionError> {
        if let Some(runtime) = self.runtime.detect().await {
            info!(runtime = %runtime.display(), "Using installed Python runtime");
            return Ok(runtime);
        }

        info!("No suitable Python runtime found, acquiring one");
        let on_step = |step: RuntimeStep, percent: u8, message: &str| {
            let (stage, band) = match step {
                RuntimeStep::Downloading => (SetupStage::DownloadingRuntime, RUNTIME_DOWNLOAD_BAND),
                RuntimeStep::Installing => (SetupStage::InstallingRuntime, RUNTIME_INSTALL_BAND),
            };
            report(InstallationState::new(stage, scale(band, percent), message));
        };

        self.runtime
            .acquire(&on_step)
            .await
            .map_err(ProvisionError::Runtime)
    }

    async fn install_with_retry(&self, report: SetupReport<'_>) -> Result<(), ProvisionError> {
        let attempts = self.config.install_attempts.max(1);
        let progress = Mutex::new(PipProgress::default());

        let on_line = |line: &str| {
            debug!(target: "reviewlens::pip", "{line}");
            let update = match progress.lock() {
                Ok(mut tracker) => tracker.observe(line),
                Err(poisoned) => poisoned.into_inner().observe(line),
            };
            if let Some((percent, message)) = update {
                report(InstallationState::new(
                    SetupStage::InstallingDeps,
                    scale(DEPS_BAND, percent),
                    message,
                ));
            }
        };

        let current = || match progress.lock() {
            Ok(tracker) => tracker.percent(),
            Err(poisoned) => poisoned.into_inner().percent(),
        };

        let mut attempt = 1;
        loop {
            // Retries report from the estimate so far, never the band start
            report(InstallationState::new(
                SetupStage::InstallingDeps,
                scale(DEPS_BAND, current()),
                format!("Installing dependencies (attempt {attempt}/{attempts})"),
            ));

            match self.env.install_dependencies(&on_line).await {
                Ok(()) => return Ok(()),
                Err(source) if attempt >= attempts => {
                    return Err(ProvisionError::Install { attempts, source });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Dependency installation failed, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn ensure_output_dirs(&self) -> Result<(), ProvisionError> {
        for dir in &self.config.output_dirs {
            create_dir(dir)?;
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), ProvisionError> {
    std::fs::create_dir_all(path).map_err(|e| ProvisionError::OutputDir {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_maps_into_band() {
        assert_eq!(scale((35, 90), 0), 35);
        assert_eq!(scale((35, 90), 100), 90);
        assert_eq!(scale((35, 90), 50), 62);
        assert_eq!(scale((5, 15), 200), 15);
    }

    #[test]
    fn test_insufficient_disk_message_is_actionable() {
        let err = ProvisionError::InsufficientDisk {
            path: PathBuf::from("/data"),
            available: GIB,
            required: MIN_FREE_BYTES,
        };
        let msg = err.to_string();
        assert!(msg.contains("1.0 GB available"));
        assert!(msg.contains("5.0 GB required"));
        assert!(msg.contains("Free up space"));
    }
}
