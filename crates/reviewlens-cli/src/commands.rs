//! Command and subcommand definitions.

use std::path::PathBuf;

use clap::Subcommand;
use serde_json::Value;

#[derive(Subcommand)]
pub enum Commands {
    /// Show resolved paths for all reviewlens directories
    Paths,

    /// Provision the isolated Python environment for the worker
    Setup,

    /// Manage the local inference service
    Service {
        #[command(subcommand)]
        command: ServiceCommand,
    },

    /// Send commands to the analysis worker
    Worker {
        #[command(subcommand)]
        command: WorkerAction,
    },

    /// Remove everything reviewlens installed
    Cleanup {
        /// Skip the confirmation prompt (for uninstallers)
        #[arg(long)]
        auto: bool,
    },
}

#[derive(Subcommand)]
pub enum ServiceCommand {
    /// Install the service and, optionally, pull a model
    Install {
        /// Model to pull after installing (defaults to the configured local model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List installed models
    Models,

    /// Delete an installed model
    Remove {
        /// Model name, e.g. "llama3.2:3b"
        name: String,
    },

    /// Stop the service and remove its files
    Uninstall,
}

#[derive(Subcommand)]
pub enum WorkerAction {
    /// Check the worker answers
    Ping,

    /// Run one pipeline phase (1-9)
    Phase {
        phase: u32,
        /// Phase configuration as a JSON object
        #[arg(long, value_parser = parse_json)]
        config: Option<Value>,
    },

    /// Report pipeline status
    Status,

    /// Check a dataset file before running the pipeline
    Validate { path: PathBuf },

    /// Send an arbitrary action
    Exec {
        action: String,
        /// Extra parameter as key=value; values parse as JSON when possible
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))
}

/// Parse `key=value`; the value is JSON if it parses, a string otherwise.
pub fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
