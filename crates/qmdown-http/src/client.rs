//! reqwest implementation of the engine's HTTP port.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;

use qmdown_core::ports::{HttpClientPort, HttpError, ProbeResponse, StreamResponse};

use crate::config::HttpClientConfig;
use crate::error::ClientBuildError;

/// HTTP client backed by a shared `reqwest::Client` (connection pooling,
/// rustls).
///
/// Non-2xx statuses are returned as-is; the engine decides what they mean.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Build a client from `config`.
    pub fn new(config: &HttpClientConfig) -> Result<Self, ClientBuildError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let invalid = |reason: String| ClientBuildError::InvalidHeader {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        let redirect = if config.max_redirects == 0 {
            Policy::none()
        } else {
            Policy::limited(config.max_redirects)
        };

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .redirect(redirect)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Build a client with default settings.
    pub fn with_defaults() -> Result<Self, ClientBuildError> {
        Self::new(&HttpClientConfig::default())
    }
}

/// Read `Content-Length` from the headers.
///
/// reqwest's `content_length()` reflects the body size hint, which is zero
/// for HEAD responses, so the header is parsed directly. A zero length is
/// treated as unknown.
fn header_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|&length| length > 0)
}

fn map_request_error(err: &reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Transport(err.to_string())
    }
}

fn map_body_error(err: &reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Body(err.to_string())
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttpClient {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, HttpError> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_request_error(&e))?;

        let probe = ProbeResponse {
            status: response.status().as_u16(),
            content_length: header_length(response.headers()),
        };
        tracing::debug!(
            target: "qmdown.http",
            url,
            status = probe.status,
            content_length = ?probe.content_length,
            "HEAD"
        );
        Ok(probe)
    }

    async fn stream(&self, url: &str, timeout: Duration) -> Result<StreamResponse, HttpError> {
        // A reqwest request timeout would also cover the body, so only the
        // wait for headers is bounded here.
        let response = tokio::time::timeout(timeout, self.client.get(url).send())
            .await
            .map_err(|_| HttpError::Timeout)?
            .map_err(|e| map_request_error(&e))?;

        let status = response.status().as_u16();
        let content_length = header_length(response.headers());
        tracing::debug!(
            target: "qmdown.http",
            url,
            status,
            content_length = ?content_length,
            "GET"
        );

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| map_body_error(&e)))
            .boxed();

        Ok(StreamResponse {
            status,
            content_length,
            body,
        })
    }
}
