//! Layout of the local inference service installation.

use std::path::{Path, PathBuf};

use super::error::PathError;
use super::platform::{data_root, home_dir};

/// Where the inference service binary is installed and where it keeps its
/// models and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLayout {
    install_dir: PathBuf,
    home_dir: PathBuf,
}

impl ServiceLayout {
    pub fn new(install_dir: impl Into<PathBuf>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            home_dir: home_dir.into(),
        }
    }

    /// Resolve the layout for this machine.
    ///
    /// - Windows: `%LOCALAPPDATA%\Programs\Ollama` (the vendor's per-user location)
    /// - Elsewhere: `<data_root>/ollama`
    ///
    /// The service home is always `~/.ollama`.
    pub fn resolve() -> Result<Self, PathError> {
        let install_dir = if cfg!(windows) {
            dirs::data_local_dir()
                .ok_or(PathError::NoDataDir)?
                .join("Programs")
                .join("Ollama")
        } else {
            data_root()?.join("ollama")
        };

        Ok(Self::new(install_dir, home_dir()?.join(".ollama")))
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Model store and configuration directory of the service.
    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }
}
