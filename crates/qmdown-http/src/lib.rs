//! HTTP adapter for qmdown.
//!
//! Implements [`HttpClientPort`](qmdown_core::ports::HttpClientPort) on top
//! of reqwest with rustls.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

mod client;
mod config;
mod error;

pub use client::ReqwestHttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig};
pub use error::ClientBuildError;
