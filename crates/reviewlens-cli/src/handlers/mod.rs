//! Command handlers.
//!
//! Handlers are thin: they call into the bridge or an installer built by
//! [`crate::CliContext`] and format the result for the terminal.

pub mod cleanup;
pub mod paths;
pub mod service;
pub mod setup;
pub mod worker;
