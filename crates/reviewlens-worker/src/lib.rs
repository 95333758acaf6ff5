//! Bridge to the external analysis worker.
//!
//! The worker is a long-lived child process speaking newline-delimited JSON
//! on its standard streams. This crate owns that process and exposes:
//!
//! - [`LineCodec`]: framing for the line protocol
//! - [`WorkerBridge`]: correlated request/response calls plus progress routing
//! - [`classify_diagnostic_line`]: the pure classifier for the worker's
//!   free-text diagnostic stream
//! - [`force_stop`]: escalating process termination

pub mod bridge;
pub mod codec;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod launcher;
pub mod protocol;
pub mod shutdown;
mod stream;

pub use bridge::{BridgeConfig, PhaseGuard, WorkerBridge, reset_shared_bridge, shared_bridge};
pub use codec::{CodecError, LineCodec};
pub use diagnostics::{DiagnosticLine, classify_diagnostic_line};
pub use error::BridgeError;
pub use events::BridgeEvent;
pub use launcher::{PythonWorkerLauncher, WorkerExecutable, WorkerLauncher};
pub use protocol::{Inbound, NoticeLevel, WorkerCommand, WorkerResponse, classify};
pub use shutdown::force_stop;
