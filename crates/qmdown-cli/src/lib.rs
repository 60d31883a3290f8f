//! Command-line front end for qmdown.
//!
//! - `parser` / `commands` - clap definitions
//! - `manifest` - the JSON song manifest and its URL lookup adapter
//! - `handlers` - one module per subcommand
//! - `error` - CLI errors and their exit codes

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only.
use anyhow as _;
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod error;
pub mod handlers;
pub mod manifest;
pub mod parser;

pub use commands::{Commands, FetchArgs};
pub use error::CliError;
pub use manifest::{Manifest, ManifestLookup, SongEntry};
pub use parser::Cli;
