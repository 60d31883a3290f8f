//! Batch completion summary returned by the engine's drain.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;
use super::types::TaskId;

/// A task that ended in `Failed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    /// Task identifier.
    pub id: TaskId,
    /// Source URL of the task.
    pub source_url: String,
    /// Destination that was not written.
    pub target_path: PathBuf,
    /// Attempts made (0 if cancelled while still queued).
    pub attempts: u32,
    /// The last error.
    pub error: DownloadError,
}

/// Outcome counts for one drained batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Identifier of this engine run, for correlating logs.
    pub run_id: String,
    /// Tasks written in full.
    pub completed: u32,
    /// Tasks whose target already existed.
    pub skipped: u32,
    /// Tasks that gave up, in the order they failed.
    pub failed: Vec<FailedTask>,
    /// Bytes written by completed tasks.
    pub bytes_transferred: u64,
}

impl BatchSummary {
    /// Create an empty summary for a run.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    /// Total number of tasks that reached a terminal state.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.completed + self.skipped + self.failed_count()
    }

    /// Completed plus skipped.
    #[must_use]
    pub const fn succeeded(&self) -> u32 {
        self.completed + self.skipped
    }

    /// Number of failed tasks.
    #[must_use]
    pub fn failed_count(&self) -> u32 {
        u32::try_from(self.failed.len()).unwrap_or(u32::MAX)
    }

    /// Number of failed tasks that were cut short by cancellation.
    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.failed.iter().filter(|f| f.error.is_cancelled()).count()
    }

    /// True when nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
