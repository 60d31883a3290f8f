//! Download engine configuration.
//!
//! Contains paths, limits and timings that the download engine needs.
//! Validation happens once, when the engine is constructed.

use std::path::PathBuf;
use std::time::Duration;

use crate::download::DownloadError;

/// Default number of concurrent workers.
pub const DEFAULT_WORKER_COUNT: usize = 8;
/// Default number of attempts per task.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
/// Default per-operation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default delay before the first retry; doubles on each further retry.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
/// Upper bound for the retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
/// Default size of file writes.
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024;

/// Configuration for creating a download engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory relative target paths are joined onto.
    pub save_dir: PathBuf,
    /// Number of workers, and the bound on simultaneous transfers.
    pub worker_count: usize,
    /// Maximum attempts per task (1 = no retries).
    pub retry_limit: u32,
    /// Timeout applied to each network operation (probe, request, chunk read).
    pub timeout: Duration,
    /// Delay before the first retry.
    pub retry_base_delay: Duration,
    /// Size of individual file writes.
    pub chunk_size: usize,
    /// Minimum interval between `TaskAdvanced` events per task; zero emits
    /// one per chunk.
    pub progress_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("."),
            worker_count: DEFAULT_WORKER_COUNT,
            retry_limit: DEFAULT_RETRY_LIMIT,
            timeout: DEFAULT_TIMEOUT,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: Duration::ZERO,
        }
    }
}

impl EngineConfig {
    /// Create a new config with the save directory.
    #[must_use]
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            ..Default::default()
        }
    }

    /// Set the worker count.
    #[must_use]
    pub const fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Set the retry limit.
    #[must_use]
    pub const fn with_retry_limit(mut self, attempts: u32) -> Self {
        self.retry_limit = attempts;
        self
    }

    /// Set the per-operation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the base retry delay.
    #[must_use]
    pub const fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the write chunk size.
    #[must_use]
    pub const fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the progress event interval.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Delay before retrying after `attempt` failed (1-based).
    ///
    /// `base * 2^(attempt - 1)`, capped at [`MAX_RETRY_DELAY`].
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_base_delay
            .saturating_mul(1u32 << exponent)
            .min(MAX_RETRY_DELAY)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.worker_count == 0 {
            return Err(DownloadError::invalid_config("worker count must be at least 1"));
        }
        if self.retry_limit == 0 {
            return Err(DownloadError::invalid_config("retry limit must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(DownloadError::invalid_config("chunk size must be nonzero"));
        }
        if self.timeout.is_zero() {
            return Err(DownloadError::invalid_config("timeout must be nonzero"));
        }
        if self.save_dir.as_os_str().is_empty() {
            return Err(DownloadError::invalid_config("save directory is empty"));
        }
        if self.save_dir.exists() && !self.save_dir.is_dir() {
            return Err(DownloadError::invalid_config(format!(
                "save directory {} is not a directory",
                self.save_dir.display()
            )));
        }
        Ok(())
    }
}
