//! CLI-specific error types and exit code mapping.

use qmdown_core::download::DownloadError;
use qmdown_http::ClientBuildError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument validation error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The manifest could not be parsed.
    #[error("Invalid manifest: {0}")]
    Manifest(String),

    /// The batch ran but some songs were not downloaded.
    #[error("{failed} of {total} song(s) were not downloaded")]
    PartialFailure {
        /// Songs that failed or could not be resolved.
        failed: usize,
        /// Songs in the manifest.
        total: usize,
    },
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 1: Some downloads failed
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::PartialFailure { .. } => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Manifest(_) => 65, // EX_DATAERR
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<DownloadError> for CliError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::InvalidConfig { message } => Self::Config(message),
            DownloadError::Io { .. } => Self::Io(err.to_string()),
            other => Self::Config(other.to_string()),
        }
    }
}

impl From<ClientBuildError> for CliError {
    fn from(err: ClientBuildError) -> Self {
        Self::Config(err.to_string())
    }
}
