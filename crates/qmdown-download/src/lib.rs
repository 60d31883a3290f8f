//! Quality resolution and concurrent downloading for qmdown.
//!
//! - `resolver` - walks ranked quality tiers to find download URLs
//! - `lookup` - TTL caching decorator for URL lookups
//! - `engine` - bounded worker pool streaming files to disk
//! - `progress` - terminal rendering of task events

#![deny(unused_crate_dependencies)]

// Re-export core types for convenience
pub use qmdown_core::download::{
    BatchSummary, DownloadError, FailedTask, ProgressEvent, QualityTier, SongFileType, TaskId,
    TaskSnapshot, TaskState,
};
pub use qmdown_core::ports::{
    EngineConfig, HttpClientPort, ProgressSinkPort, UrlLookupPort, UrlMap,
};

// Internal modules
pub(crate) mod queue;

mod engine;
mod lookup;
mod progress;
mod resolver;

pub use engine::{DownloadEngine, TaskHandle, plan_target, resolve_target, sanitize_file_name};
pub use lookup::CachedUrlLookup;
pub use progress::TerminalProgressSink;
pub use resolver::{QualityResolver, ResolutionResult, ResolvedUrl, TierReport, resolve};

#[cfg(test)]
use bytes as _;
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio_test as _;
