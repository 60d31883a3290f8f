//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Batch music downloader with quality fallback.
#[derive(Parser, Debug)]
#[command(name = "qmdown")]
#[command(about = "Download songs at the best available quality")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
