//! CLI entry point - the composition root.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use reviewlens_cli::{Cli, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(&cli.settings)?;

    match command {
        Commands::Paths => handlers::paths::execute(&ctx),
        Commands::Setup => handlers::setup::execute(&ctx).await,
        Commands::Service { command } => handlers::service::execute(&ctx, command).await,
        Commands::Worker { command } => handlers::worker::execute(&ctx, command).await,
        Commands::Cleanup { auto } => handlers::cleanup::execute(&ctx, auto).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
