//! Command-line front end for reviewlens.
//!
//! Stands in for a graphical shell: every long-running operation of the
//! worker bridge and the installers is reachable from here, with progress
//! rendered as terminal bars.

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;
pub mod progress;
pub mod settings_args;

pub use bootstrap::{CliContext, bootstrap};
pub use commands::{Commands, ServiceCommand, WorkerAction};
pub use parser::Cli;
pub use settings_args::SettingsArgs;
