//! Resolution of the worker executable.
//!
//! The bridge re-resolves on every restart: the managed interpreter only
//! exists once provisioning has finished, so a path resolved earlier may
//! point at a system interpreter without the worker's dependencies.

use std::path::PathBuf;

use reviewlens_core::PythonEnvLayout;
use reviewlens_core::paths::{PathError, worker_script_path};
use tracing::{debug, warn};

use crate::error::BridgeError;

/// A fully resolved command line for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExecutable {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl WorkerExecutable {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Resolves how to launch the worker.
pub trait WorkerLauncher: Send + Sync {
    fn resolve(&self) -> Result<WorkerExecutable, BridgeError>;
}

/// A fixed command line.
impl WorkerLauncher for WorkerExecutable {
    fn resolve(&self) -> Result<WorkerExecutable, BridgeError> {
        Ok(self.clone())
    }
}

/// Launches the bundled worker script with the provisioned interpreter,
/// falling back to a system interpreter before provisioning has run.
#[derive(Debug, Clone)]
pub struct PythonWorkerLauncher {
    layout: PythonEnvLayout,
    script: PathBuf,
}

impl PythonWorkerLauncher {
    pub fn new(layout: PythonEnvLayout, script: impl Into<PathBuf>) -> Self {
        Self {
            layout,
            script: script.into(),
        }
    }

    /// Launcher for the real data root and bundled resources.
    pub fn from_environment() -> Result<Self, PathError> {
        Ok(Self::new(PythonEnvLayout::resolve()?, worker_script_path()?))
    }

    fn interpreter(&self) -> Result<PathBuf, BridgeError> {
        let managed = self.layout.venv_python();
        if managed.exists() {
            return Ok(managed);
        }

        warn!(
            path = %managed.display(),
            "Managed interpreter not found, falling back to system interpreter"
        );
        which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|e| BridgeError::Launch(format!("no Python interpreter on PATH: {e}")))
    }
}

impl WorkerLauncher for PythonWorkerLauncher {
    fn resolve(&self) -> Result<WorkerExecutable, BridgeError> {
        if !self.script.is_file() {
            return Err(BridgeError::Launch(format!(
                "worker script not found at {}",
                self.script.display()
            )));
        }

        let program = self.interpreter()?;
        debug!(program = %program.display(), script = %self.script.display(), "Resolved worker");

        let mut exe = WorkerExecutable::new(program)
            .arg("-u")
            .arg(self.script.to_string_lossy());
        if let Some(dir) = self.script.parent() {
            exe = exe.working_dir(dir);
        }
        Ok(exe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_script_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = PythonWorkerLauncher::new(
            PythonEnvLayout::new(dir.path()),
            dir.path().join("python").join("api_bridge.py"),
        );
        assert!(matches!(launcher.resolve(), Err(BridgeError::Launch(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_prefers_managed_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PythonEnvLayout::new(dir.path());
        let python = layout.venv_dir().join("bin").join("python3");
        std::fs::create_dir_all(python.parent().unwrap()).unwrap();
        std::fs::write(&python, b"").unwrap();

        let script = dir.path().join("api_bridge.py");
        std::fs::write(&script, b"").unwrap();

        let exe = PythonWorkerLauncher::new(layout, &script).resolve().unwrap();
        assert_eq!(exe.program, python);
        assert_eq!(exe.args, vec!["-u".to_string(), script.to_string_lossy().into_owned()]);
        assert_eq!(exe.working_dir.as_deref(), Some(dir.path()));
    }
}
