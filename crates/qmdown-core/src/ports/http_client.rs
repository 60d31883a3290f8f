//! HTTP client port.
//!
//! The engine needs exactly two operations: a metadata probe (HEAD) and a
//! streamed GET. Both take a per-call timeout. Implementations must not
//! treat non-2xx statuses as errors; the engine inspects `status` itself.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

/// Errors raised by an HTTP client implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    /// Connection, TLS or protocol failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within its timeout.
    #[error("Request timed out")]
    Timeout,

    /// The body stream failed mid-transfer.
    #[error("Body error: {0}")]
    Body(String),
}

/// Streamed response body.
pub type ByteStream = BoxStream<'static, Result<Bytes, HttpError>>;

/// Result of a HEAD probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Length`, if the server sent one.
    pub content_length: Option<u64>,
}

impl ProbeResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Result of a streamed GET.
pub struct StreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Length`, if the server sent one.
    pub content_length: Option<u64>,
    /// The body, chunked as it arrives.
    pub body: ByteStream,
}

impl StreamResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Port for the network side of the download engine.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Issue a HEAD request.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, HttpError>;

    /// Issue a GET request and return the body as a stream.
    ///
    /// `timeout` bounds the time until response headers arrive; the engine
    /// applies its own per-chunk timeout while reading the body.
    async fn stream(&self, url: &str, timeout: Duration) -> Result<StreamResponse, HttpError>;
}
