//! Path utilities for reviewlens data directories and managed installations.
//!
//! This module provides the canonical path resolution for:
//! - The application data root and bundled resources
//! - The managed Python runtime and isolated environment (plus its markers)
//! - The worker's data and model-cache directories
//! - The local inference service installation and home directory
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - Layout structs are pure (`*::new(root)`) so they can be tested without
//!   touching the process environment; `*::resolve()` binds them to `data_root()`

mod error;
mod platform;
mod python;
mod service;

pub use error::PathError;
pub use platform::{data_root, home_dir, resource_root};
pub use python::{PythonEnvLayout, venv_python, worker_script_path};
pub use service::ServiceLayout;
