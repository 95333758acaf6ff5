//! Runtime acquisition through the system package manager.

use std::path::PathBuf;

use async_trait::async_trait;
use reviewlens_core::ports::{EnvError, RuntimeProvider, RuntimeReport, RuntimeStep};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::detect_python;
use crate::process::run_streaming;

/// A package manager invocation that installs a suitable runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManager {
    pub program: &'static str,
    pub args: &'static [&'static str],
    /// Needs root; elevated with `pkexec` when not already root.
    pub privileged: bool,
}

/// Managers tried in order.
pub const PACKAGE_MANAGERS: &[PackageManager] = &[
    PackageManager {
        program: "brew",
        args: &["install", "python@3.12"],
        privileged: false,
    },
    PackageManager {
        program: "apt-get",
        args: &["install", "-y", "python3", "python3-venv", "python3-pip"],
        privileged: true,
    },
    PackageManager {
        program: "dnf",
        args: &["install", "-y", "python3", "python3-pip"],
        privileged: true,
    },
    PackageManager {
        program: "yum",
        args: &["install", "-y", "python3", "python3-pip"],
        privileged: true,
    },
    PackageManager {
        program: "pacman",
        args: &["-S", "--noconfirm", "python", "python-pip"],
        privileged: true,
    },
    PackageManager {
        program: "zypper",
        args: &["--non-interactive", "install", "python3", "python3-pip"],
        privileged: true,
    },
];

/// Installs the runtime with the first package manager that succeeds.
#[derive(Debug, Clone)]
pub struct PackageManagerRuntime {
    managed_dir: PathBuf,
    managers: Vec<PackageManager>,
}

impl PackageManagerRuntime {
    pub fn new(managed_dir: impl Into<PathBuf>) -> Self {
        Self {
            managed_dir: managed_dir.into(),
            managers: PACKAGE_MANAGERS.to_vec(),
        }
    }

    #[must_use]
    pub fn with_managers(mut self, managers: Vec<PackageManager>) -> Self {
        self.managers = managers;
        self
    }

    fn command_for(manager: &PackageManager) -> Command {
        if manager.privileged && !is_root() {
            let mut cmd = Command::new("pkexec");
            cmd.arg(manager.program).args(manager.args);
            cmd
        } else {
            let mut cmd = Command::new(manager.program);
            cmd.args(manager.args);
            cmd
        }
    }
}

#[async_trait]
impl RuntimeProvider for PackageManagerRuntime {
    async fn detect(&self) -> Option<PathBuf> {
        detect_python(&self.managed_dir).await
    }

    async fn acquire(&self, report: RuntimeReport<'_>) -> Result<PathBuf, EnvError> {
        let available: Vec<&PackageManager> = self
            .managers
            .iter()
            .filter(|m| which::which(m.program).is_ok())
            .collect();

        if available.is_empty() {
            return Err(EnvError::RuntimeUnavailable(
                "no supported package manager found; install Python 3.10 or newer manually"
                    .to_string(),
            ));
        }

        let mut failures = Vec::new();
        for manager in available {
            let message = format!("Installing Python with {}", manager.program);
            report(RuntimeStep::Installing, 0, &message);
            info!(manager = manager.program, "Installing Python runtime");

            let on_line = |line: &str| debug!(target: "reviewlens::pkg", "{line}");
            match run_streaming(Self::command_for(manager), &on_line).await {
                Ok(outcome) if outcome.status.success() => {
                    if let Some(python) = self.detect().await {
                        report(RuntimeStep::Installing, 100, "Python installed");
                        return Ok(python);
                    }
                    failures.push(format!("{}: runtime still not usable", manager.program));
                }
                Ok(outcome) => failures.push(format!("{}: {}", manager.program, outcome.failure())),
                Err(e) => failures.push(format!("{}: {e}", manager.program)),
            }
            warn!(manager = manager.program, "Package manager did not provide a usable runtime");
        }

        Err(EnvError::RuntimeUnavailable(failures.join("; ")))
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
const fn is_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brew_is_tried_first_and_unprivileged() {
        assert_eq!(PACKAGE_MANAGERS[0].program, "brew");
        assert!(!PACKAGE_MANAGERS[0].privileged);
        assert!(PACKAGE_MANAGERS[1..].iter().all(|m| m.privileged));
    }

    #[tokio::test]
    async fn test_no_manager_available() {
        let runtime = PackageManagerRuntime::new("/nonexistent").with_managers(vec![PackageManager {
            program: "reviewlens-no-such-package-manager",
            args: &[],
            privileged: false,
        }]);
        let report = |_: RuntimeStep, _: u8, _: &str| {};
        let err = runtime.acquire(&report).await.unwrap_err();
        assert!(matches!(err, EnvError::RuntimeUnavailable(_)));
    }
}
