//! Core domain types and port definitions for qmdown.
//!
//! - `download` - task, quality, event and summary types
//! - `ports` - traits the engine depends on, plus engine configuration
//! - `cache` - TTL memoization for idempotent remote lookups

#![deny(unused_crate_dependencies)]

pub mod cache;
pub mod download;
pub mod ports;

// Re-export commonly used types for convenience
pub use cache::{Memoized, TtlCache, memoize};
pub use download::{
    BatchSummary, DownloadError, FailedTask, ProgressEvent, QualityTier, SongFileType, TaskId,
    TaskSnapshot, TaskState,
};
pub use ports::{
    ByteStream, EngineConfig, HttpClientPort, HttpError, LookupError, NoopProgressSink,
    ProbeResponse, ProgressSinkPort, RecordingProgressSink, StreamResponse, UrlLookupPort, UrlMap,
};

#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tokio_test as _;
