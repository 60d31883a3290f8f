//! Public configuration for the HTTP adapter.

use std::time::Duration;

/// Default user agent, mirroring a desktop browser so CDNs serve the file.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Configuration for [`ReqwestHttpClient`](crate::ReqwestHttpClient).
///
/// Per-request timeouts come from the engine; this only covers settings
/// fixed for the client's lifetime.
///
/// # Example
///
/// ```
/// use qmdown_http::HttpClientConfig;
/// use std::time::Duration;
///
/// let config = HttpClientConfig::new()
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_header("Referer", "https://y.qq.com/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// User agent string for HTTP requests
    pub(crate) user_agent: String,
    /// TCP/TLS connect timeout
    pub(crate) connect_timeout: Duration,
    /// Redirect hops to follow; zero disables redirects
    pub(crate) max_redirects: usize,
    /// Headers sent with every request
    pub(crate) default_headers: Vec<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            max_redirects: 10,
            default_headers: Vec::new(),
        }
    }
}

impl HttpClientConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the connect timeout.
    ///
    /// Defaults to 10 seconds.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how many redirects to follow.
    ///
    /// Defaults to 10.
    #[must_use]
    pub const fn with_max_redirects(mut self, hops: usize) -> Self {
        self.max_redirects = hops;
        self
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The configured user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
