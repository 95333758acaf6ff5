//! Base runtime acquisition.
//!
//! Every provider first looks for an interpreter that is already usable:
//! the managed runtime directory, then well-known names on `PATH`. When
//! none is found, Windows downloads the official installer and other
//! platforms try a list of system package managers in order.

mod installer;
mod package_manager;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use reviewlens_core::PythonEnvLayout;
use reviewlens_core::ports::RuntimeProvider;
use tokio::process::Command;
use tracing::debug;

pub use installer::InstallerRuntime;
pub use package_manager::{PackageManager, PackageManagerRuntime};

/// Oldest runtime the worker supports.
pub const MIN_PYTHON: (u32, u32) = (3, 10);

const CANDIDATE_NAMES: &[&str] = &["python3.12", "python3.11", "python3.10", "python3", "python"];

/// Prints `major.minor` and fails if `venv` or `ensurepip` is missing.
const PROBE_SCRIPT: &str = "import sys, venv, ensurepip; print('%d.%d' % sys.version_info[:2])";

/// The runtime provider for this platform.
pub fn default_runtime_provider(layout: &PythonEnvLayout) -> Arc<dyn RuntimeProvider> {
    let managed = layout.managed_runtime_dir();
    if cfg!(windows) {
        Arc::new(InstallerRuntime::new(managed, layout.data_root().join("downloads")))
    } else {
        Arc::new(PackageManagerRuntime::new(managed))
    }
}

/// Interpreter inside a runtime installed into `dir`.
pub fn managed_python(dir: &Path) -> PathBuf {
    if cfg!(windows) {
        dir.join("python.exe")
    } else {
        dir.join("bin").join("python3")
    }
}

/// First usable interpreter: the managed one, then names on `PATH`.
pub async fn detect_python(managed_dir: &Path) -> Option<PathBuf> {
    let managed = managed_python(managed_dir);
    if managed.exists() && probe(&managed).await {
        return Some(managed);
    }

    for name in CANDIDATE_NAMES {
        let Ok(path) = which::which(name) else {
            continue;
        };
        if probe(&path).await {
            return Some(path);
        }
    }
    None
}

/// Whether `python` runs, is new enough and can create environments.
async fn probe(python: &Path) -> bool {
    let output = Command::new(python)
        .args(["-c", PROBE_SCRIPT])
        .stdin(Stdio::null())
        .output()
        .await;

    let Ok(output) = output else {
        return false;
    };
    if !output.status.success() {
        debug!(python = %python.display(), "Runtime probe failed");
        return false;
    }

    let version = String::from_utf8_lossy(&output.stdout);
    match parse_version(version.trim()) {
        Some(found) if found >= MIN_PYTHON => true,
        found => {
            debug!(python = %python.display(), ?found, "Runtime too old");
            false
        }
    }
}

fn parse_version(text: &str) -> Option<(u32, u32)> {
    let (major, minor) = text.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}
