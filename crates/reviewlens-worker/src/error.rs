//! Worker bridge error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::codec::CodecError;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The worker executable could not be resolved.
    #[error("Cannot locate worker: {0}")]
    Launch(String),

    #[error("Failed to spawn worker {program}: {reason}")]
    Spawn { program: PathBuf, reason: String },

    /// The start handshake failed (e.g. the process exited before ready).
    #[error("Worker failed to start: {0}")]
    StartFailed(String),

    /// Writing the command to the worker's input failed.
    #[error("Failed to send '{action}' to worker: {reason}")]
    Write { action: String, reason: String },

    #[error("Command '{action}' timed out after {timeout:?}")]
    Timeout { action: String, timeout: Duration },

    /// The bridge was stopped while the call was pending.
    #[error("Worker bridge stopped")]
    Stopped,

    /// The worker process exited while the call was pending.
    #[error("Worker process exited")]
    Closed,

    #[error("Unknown pipeline phase {0}")]
    UnknownPhase(u32),

    /// The worker answered with `success: false`.
    #[error("{error}")]
    Worker {
        error: String,
        traceback: Option<String>,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}
