//! Layout of the managed Python runtime and isolated environment.

use std::path::{Path, PathBuf};

use super::error::PathError;
use super::platform::{data_root, resource_root};

const ENV_ROOT_DIR: &str = "python-env";
const VENV_DIR: &str = "venv";
const RUNTIME_DIR: &str = "python-runtime";
const IN_PROGRESS_MARKER: &str = ".setup-in-progress";
const COMPLETE_MARKER: &str = ".setup-complete";

/// Directory layout of everything the environment provisioner creates.
///
/// All derived paths hang off a single root so the layout can be built
/// against a temporary directory in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonEnvLayout {
    root: PathBuf,
}

impl PythonEnvLayout {
    /// Build a layout rooted at `data_root`.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            root: data_root.into(),
        }
    }

    /// Build the layout for the real application data root.
    pub fn resolve() -> Result<Self, PathError> {
        Ok(Self::new(data_root()?))
    }

    /// Application data root this layout hangs off.
    pub fn data_root(&self) -> &Path {
        &self.root
    }

    /// Parent of the isolated environment, the markers and worker data.
    pub fn env_root(&self) -> PathBuf {
        self.root.join(ENV_ROOT_DIR)
    }

    /// The isolated (virtual) environment directory.
    pub fn venv_dir(&self) -> PathBuf {
        self.env_root().join(VENV_DIR)
    }

    /// Interpreter inside the isolated environment.
    pub fn venv_python(&self) -> PathBuf {
        venv_python(&self.venv_dir())
    }

    /// Directory for a runtime the provisioner downloaded itself.
    pub fn managed_runtime_dir(&self) -> PathBuf {
        self.root.join(RUNTIME_DIR)
    }

    /// Marker written before the environment is mutated.
    pub fn in_progress_marker(&self) -> PathBuf {
        self.env_root().join(IN_PROGRESS_MARKER)
    }

    /// Marker written once final validation has passed.
    pub fn complete_marker(&self) -> PathBuf {
        self.env_root().join(COMPLETE_MARKER)
    }

    /// Worker data directory (`DATA_DIR`), survives application updates.
    pub fn worker_data_dir(&self) -> PathBuf {
        self.env_root().join("data")
    }

    /// Worker model cache (`MODELS_CACHE_DIR`).
    pub fn models_cache_dir(&self) -> PathBuf {
        self.env_root().join("models").join("hf_cache")
    }

    /// Directories for derived outputs that must exist before setup commits.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let data = self.worker_data_dir();
        vec![
            data.join("shared"),
            data.join("visualizaciones"),
            self.models_cache_dir(),
            data,
        ]
    }
}

/// Path to the Python interpreter inside a virtual environment.
pub fn venv_python(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts").join("python.exe")
    } else {
        let bin = env_dir.join("bin");
        let python3 = bin.join("python3");
        if python3.exists() {
            python3
        } else {
            bin.join("python")
        }
    }
}

/// Path to the bundled worker entry script.
pub fn worker_script_path() -> Result<PathBuf, PathError> {
    Ok(resource_root()?.join("python").join("api_bridge.py"))
}
