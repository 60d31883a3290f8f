//! Commands enum and their arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use qmdown_core::download::{QualityTier, SongFileType};
use qmdown_core::ports::{DEFAULT_RETRY_LIMIT, DEFAULT_TIMEOUT, DEFAULT_WORKER_COUNT, EngineConfig};

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every song in a manifest at the best available quality
    Fetch(FetchArgs),
}

/// Arguments for `qmdown fetch`.
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// JSON manifest listing songs and their per-quality URLs
    pub manifest: PathBuf,

    /// Directory to save files into
    #[arg(short, long, env = "QMDOWN_OUTPUT", default_value = ".")]
    pub output: PathBuf,

    /// Highest quality to try (e.g. "flac", "mp3_320", "ogg_192")
    #[arg(short = 'q', long, env = "QMDOWN_MAX_QUALITY", default_value = "flac")]
    pub max_quality: SongFileType,

    /// Number of concurrent downloads
    #[arg(short = 'n', long, env = "QMDOWN_WORKERS", default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Attempts per file before giving up
    #[arg(long, env = "QMDOWN_RETRIES", default_value_t = DEFAULT_RETRY_LIMIT)]
    pub retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "QMDOWN_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl FetchArgs {
    /// Engine configuration derived from the arguments.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(&self.output)
            .with_worker_count(self.workers)
            .with_retry_limit(self.retries)
            .with_timeout(Duration::from_secs(self.timeout))
    }

    /// Ranked quality tiers, starting at `max_quality`.
    pub fn tiers(&self) -> Vec<QualityTier> {
        SongFileType::priority_from(self.max_quality)
    }
}
