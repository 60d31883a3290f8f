//! Command handlers.
//!
//! Each handler owns one subcommand: it builds the adapters the command
//! needs and delegates the real work to `qmdown-download`.

pub mod fetch;
