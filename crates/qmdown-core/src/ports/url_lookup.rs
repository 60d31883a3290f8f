//! URL lookup port.
//!
//! Abstracts the remote "give me download URLs for these songs at this
//! quality" call so the resolver can be exercised without the music
//! service.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::download::QualityTier;

/// Result of one batch lookup: identifier → URL, or `None` when the
/// service has no file for that identifier at the requested tier.
///
/// Identifiers missing from the map are treated the same as `None`.
pub type UrlMap = HashMap<String, Option<String>>;

/// Errors from a remote URL lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// The service answered with an error.
    #[error("Remote error{}: {message}", code.map(|c| format!(" {c}")).unwrap_or_default())]
    Remote {
        /// Service-specific error code, if any.
        code: Option<i64>,
        /// Error message from the service.
        message: String,
    },

    /// The request never got an answer.
    #[error("Network error: {0}")]
    Network(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl LookupError {
    /// Create a remote error without a code.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            code: None,
            message: message.into(),
        }
    }
}

/// Port for batch URL resolution at a given quality tier.
#[async_trait]
pub trait UrlLookupPort: Send + Sync {
    /// Look up download URLs for `ids` at `tier`.
    ///
    /// Implementations may return extra keys; the resolver only reads the
    /// identifiers it asked for.
    async fn lookup_urls(&self, ids: &[String], tier: &QualityTier) -> Result<UrlMap, LookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = LookupError::Remote {
            code: Some(104_003),
            message: "need login".to_string(),
        };
        assert_eq!(err.to_string(), "Remote error 104003: need login");
        assert_eq!(LookupError::remote("busy").to_string(), "Remote error: busy");
    }
}
