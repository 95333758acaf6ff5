//! Marker files on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reviewlens_core::PythonEnvLayout;
use reviewlens_core::ports::{MarkerInfo, MarkerState, MarkerStore};
use tracing::debug;

/// [`MarkerStore`] backed by two JSON files.
#[derive(Debug, Clone)]
pub struct FsMarkerStore {
    in_progress: PathBuf,
    complete: PathBuf,
}

impl FsMarkerStore {
    pub fn new(in_progress: impl Into<PathBuf>, complete: impl Into<PathBuf>) -> Self {
        Self {
            in_progress: in_progress.into(),
            complete: complete.into(),
        }
    }

    pub fn for_layout(layout: &PythonEnvLayout) -> Self {
        Self::new(layout.in_progress_marker(), layout.complete_marker())
    }

    fn write(path: &Path, info: &MarkerInfo) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(info).map_err(io::Error::other)?;
        fs::write(path, payload)
    }

    fn remove(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl MarkerStore for FsMarkerStore {
    fn state(&self) -> MarkerState {
        // A crash between commit's two writes leaves both; the commit stands.
        if self.complete.exists() {
            MarkerState::Complete
        } else if self.in_progress.exists() {
            MarkerState::InProgress
        } else {
            MarkerState::Absent
        }
    }

    fn begin(&self, info: &MarkerInfo) -> io::Result<()> {
        debug!(path = %self.in_progress.display(), "Writing in-progress marker");
        Self::remove(&self.complete)?;
        Self::write(&self.in_progress, info)
    }

    fn commit(&self, info: &MarkerInfo) -> io::Result<()> {
        debug!(path = %self.complete.display(), "Writing completion marker");
        Self::write(&self.complete, info)?;
        Self::remove(&self.in_progress)
    }

    fn reset(&self) -> io::Result<()> {
        Self::remove(&self.in_progress)?;
        Self::remove(&self.complete)
    }
}
