//! Detection and removal of everything the installers created.
//!
//! Used by `reviewlens cleanup` on demand and by platform uninstallers via
//! `reviewlens cleanup --auto`. Every step is best-effort: a failure on one
//! resource is recorded and the remaining resources are still removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reviewlens_core::PythonEnvLayout;
use reviewlens_core::paths::ServiceLayout;
use reviewlens_core::ports::{ServiceApi, ServicePlatform};
use tokio::process::Command;
use tracing::{info, warn};

/// Locations the coordinator is responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTargets {
    pub data_dir: PathBuf,
    pub service_install_dir: PathBuf,
    pub service_home_dir: PathBuf,
}

impl CleanupTargets {
    pub fn from_layouts(layout: &PythonEnvLayout, service: &ServiceLayout) -> Self {
        Self {
            data_dir: layout.data_root().to_path_buf(),
            service_install_dir: service.install_dir().to_path_buf(),
            service_home_dir: service.home_dir().to_path_buf(),
        }
    }
}

/// What currently exists on this machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedResources {
    pub data_dir: Option<PathBuf>,
    pub service_install_dir: Option<PathBuf>,
    pub service_home_dir: Option<PathBuf>,
    pub service_running: bool,
}

impl DetectedResources {
    pub fn paths(&self) -> Vec<&Path> {
        [
            &self.data_dir,
            &self.service_install_dir,
            &self.service_home_dir,
        ]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.paths().is_empty() && !self.service_running
    }
}

/// Outcome of a best-effort removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl RemovalReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Stops the inference service and removes the app's data and the
/// service's files.
pub struct UninstallCoordinator {
    targets: CleanupTargets,
    platform: Arc<dyn ServicePlatform>,
    api: Arc<dyn ServiceApi>,
}

impl UninstallCoordinator {
    pub fn new(
        targets: CleanupTargets,
        platform: Arc<dyn ServicePlatform>,
        api: Arc<dyn ServiceApi>,
    ) -> Self {
        Self {
            targets,
            platform,
            api,
        }
    }

    pub fn targets(&self) -> &CleanupTargets {
        &self.targets
    }

    pub async fn detect(&self) -> DetectedResources {
        let existing = |p: &Path| p.exists().then(|| p.to_path_buf());
        DetectedResources {
            data_dir: existing(&self.targets.data_dir),
            service_install_dir: existing(&self.targets.service_install_dir),
            service_home_dir: existing(&self.targets.service_home_dir),
            service_running: self.api.is_healthy().await,
        }
    }

    /// Remove every detected resource.
    pub async fn cleanup(&self) -> RemovalReport {
        let detected = self.detect().await;
        let mut report = RemovalReport::default();

        if detected.service_running || detected.service_install_dir.is_some() {
            if let Err(e) = self.platform.stop().await {
                warn!(error = %e, "Failed to stop inference service");
                report.failures.push(format!("stop service: {e}"));
            }
        }

        for path in detected.paths() {
            remove_path(path, &mut report).await;
        }

        if detected.service_install_dir.is_some() {
            if let Err(e) = self.platform.unregister().await {
                warn!(error = %e, "Failed to remove PATH registration");
                report.failures.push(format!("PATH registration: {e}"));
            }
        }

        info!(
            removed = report.removed.len(),
            failures = report.failures.len(),
            "Cleanup finished"
        );
        report
    }
}

/// Remove `path`, falling back to the OS removal command, and record the
/// outcome in `report`. Missing paths are skipped.
pub async fn remove_path(path: &Path, report: &mut RemovalReport) {
    if !path.exists() {
        return;
    }

    let direct = if path.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match direct {
        Ok(()) => {
            info!(path = %path.display(), "Removed");
            report.removed.push(path.to_path_buf());
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Direct removal failed, trying fallback");
            match fallback_remove(path).await {
                Ok(()) if !path.exists() => report.removed.push(path.to_path_buf()),
                Ok(()) => report
                    .failures
                    .push(format!("{}: still present after removal", path.display())),
                Err(fallback) => report
                    .failures
                    .push(format!("{}: {e}; fallback: {fallback}", path.display())),
            }
        }
    }
}

async fn fallback_remove(path: &Path) -> std::io::Result<()> {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "rmdir", "/S", "/Q"]);
        cmd
    } else {
        let mut cmd = Command::new("rm");
        cmd.arg("-rf");
        cmd
    };

    let status = cmd.arg(path).status().await?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("removal command exited with {status}")))
    }
}
