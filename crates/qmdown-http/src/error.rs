//! Errors raised while building the HTTP client.
//!
//! Request-time failures are mapped to the core `HttpError` at the port
//! boundary; only construction has its own error type.

use thiserror::Error;

/// Errors from [`ReqwestHttpClient::new`](crate::ReqwestHttpClient::new).
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// A default header name or value could not be encoded.
    #[error("Invalid default header '{name}': {reason}")]
    InvalidHeader {
        /// The offending header name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The underlying client failed to initialise (TLS backend, etc.).
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}
