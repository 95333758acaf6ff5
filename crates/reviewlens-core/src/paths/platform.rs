//! Platform-specific root directory resolution.

use std::env;
use std::fs;
use std::path::PathBuf;

use super::error::PathError;

/// Environment override for the application data root.
pub const DATA_DIR_ENV: &str = "REVIEWLENS_DATA_DIR";

/// Environment override for the bundled resources root.
pub const RESOURCE_DIR_ENV: &str = "REVIEWLENS_RESOURCE_DIR";

/// Get the root directory for application data.
///
/// Resolution order:
/// 1. `REVIEWLENS_DATA_DIR` environment variable
/// 2. System data directory (e.g., `~/.local/share/reviewlens`)
///
/// The directory is created if it does not exist.
pub fn data_root() -> Result<PathBuf, PathError> {
    let root = match env::var(DATA_DIR_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => dirs::data_local_dir()
            .ok_or(PathError::NoDataDir)?
            .join("reviewlens"),
    };

    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| PathError::CreateFailed {
            path: root.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(root)
}

/// Get the root directory for bundled resources (the worker script lives here).
///
/// Resolution order:
/// 1. `REVIEWLENS_RESOURCE_DIR` environment variable
/// 2. `resources/` next to the running executable, if present
/// 3. The executable's directory
pub fn resource_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(RESOURCE_DIR_ENV)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    let exe = env::current_exe().map_err(|e| PathError::ExecutableLocation(e.to_string()))?;
    let exe_dir = exe
        .parent()
        .map(PathBuf::from)
        .ok_or_else(|| PathError::ExecutableLocation(exe.display().to_string()))?;

    let bundled = exe_dir.join("resources");
    if bundled.is_dir() {
        Ok(bundled)
    } else {
        Ok(exe_dir)
    }
}

/// Get the user's home directory.
pub fn home_dir() -> Result<PathBuf, PathError> {
    dirs::home_dir().ok_or(PathError::NoHomeDir)
}
