//! Runtime acquisition by downloading the official Windows installer.

use std::path::PathBuf;

use async_trait::async_trait;
use reviewlens_core::ports::{EnvError, RuntimeProvider, RuntimeReport, RuntimeStep};
use tokio::process::Command;
use tracing::{info, warn};

use super::{detect_python, managed_python};
use crate::download::{download_to_file, percent};

const PYTHON_INSTALLER_URL: &str =
    "https://www.python.org/ftp/python/3.12.7/python-3.12.7-amd64.exe";

/// Per-user, no PATH changes, no test suite.
const INSTALLER_FLAGS: &[&str] = &[
    "/quiet",
    "InstallAllUsers=0",
    "PrependPath=0",
    "Include_test=0",
    "Include_launcher=0",
];

/// Installs a private runtime into the managed runtime directory.
#[derive(Debug, Clone)]
pub struct InstallerRuntime {
    target_dir: PathBuf,
    download_dir: PathBuf,
    url: String,
    client: reqwest::Client,
}

impl InstallerRuntime {
    pub fn new(target_dir: impl Into<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            download_dir: download_dir.into(),
            url: PYTHON_INSTALLER_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RuntimeProvider for InstallerRuntime {
    async fn detect(&self) -> Option<PathBuf> {
        detect_python(&self.target_dir).await
    }

    async fn acquire(&self, report: RuntimeReport<'_>) -> Result<PathBuf, EnvError> {
        let installer = self.download_dir.join("python-installer.exe");

        report(RuntimeStep::Downloading, 0, "Downloading Python");
        let on_progress = |done: u64, total: u64| {
            report(RuntimeStep::Downloading, percent(done, total), "Downloading Python");
        };
        download_to_file(&self.client, &self.url, &installer, &on_progress)
            .await
            .map_err(|e| EnvError::RuntimeUnavailable(format!("{e:#}")))?;

        report(RuntimeStep::Installing, 0, "Installing Python");
        info!(target = %self.target_dir.display(), "Running Python installer");
        let status = Command::new(&installer)
            .args(INSTALLER_FLAGS)
            .arg(format!("TargetDir={}", self.target_dir.display()))
            .status()
            .await;

        if let Err(e) = tokio::fs::remove_file(&installer).await {
            warn!(error = %e, "Failed to remove Python installer");
        }

        let status = status?;
        if !status.success() {
            return Err(EnvError::RuntimeUnavailable(format!(
                "Python installer exited with {status}"
            )));
        }

        report(RuntimeStep::Installing, 100, "Python installed");
        let python = managed_python(&self.target_dir);
        if python.exists() {
            Ok(python)
        } else {
            Err(EnvError::RuntimeUnavailable(format!(
                "installer finished but {} is missing",
                python.display()
            )))
        }
    }
}
