//! Root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;
use crate::settings_args::SettingsArgs;

/// Command-line interface for the review analysis toolkit.
#[derive(Parser)]
#[command(name = "reviewlens")]
#[command(about = "Provision and drive the reviewlens analysis worker")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
