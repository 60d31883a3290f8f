//! CLI entry point: logging, argument parsing and command dispatch.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use qmdown_cli::{Cli, CliError, Commands, handlers};

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads QMDOWN_* defaults
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let result: Result<(), CliError> = match cli.command {
        Some(Commands::Fetch(args)) => handlers::fetch::execute(args).await,
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
    Ok(())
}
