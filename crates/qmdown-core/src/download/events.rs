//! Task lifecycle events - discriminated union for everything a progress
//! sink can observe.
//!
//! Per task, events arrive in lifecycle order:
//! `created → started → advanced* → (retrying → started → advanced*)* →
//! completed | failed`, or `created → skipped`. No ordering holds across
//! different tasks.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::types::TaskId;

/// Single discriminated union for all task events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A task was enqueued.
    TaskCreated {
        /// Task identifier.
        id: TaskId,
        /// Short name for display (target file name).
        name: String,
        /// Destination path.
        target: PathBuf,
    },

    /// An attempt began.
    TaskStarted {
        /// Task identifier.
        id: TaskId,
        /// 1-based attempt number.
        attempt: u32,
    },

    /// Bytes were written to disk.
    TaskAdvanced {
        /// Task identifier.
        id: TaskId,
        /// Bytes written so far in this attempt.
        transferred: u64,
        /// Expected size, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// An attempt failed and another one is scheduled.
    TaskRetrying {
        /// Task identifier.
        id: TaskId,
        /// The attempt that just failed.
        attempt: u32,
        /// Configured retry limit.
        max_attempts: u32,
        /// Why the attempt failed.
        error: String,
    },

    /// The target already existed.
    TaskSkipped {
        /// Task identifier.
        id: TaskId,
    },

    /// The file was fully written.
    TaskCompleted {
        /// Task identifier.
        id: TaskId,
        /// Final size in bytes.
        bytes: u64,
    },

    /// The task gave up.
    TaskFailed {
        /// Task identifier.
        id: TaskId,
        /// Attempts made before giving up (0 when cancelled while queued).
        attempts: u32,
        /// The last error.
        error: String,
    },
}

impl ProgressEvent {
    /// The task this event belongs to.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match self {
            Self::TaskCreated { id, .. }
            | Self::TaskStarted { id, .. }
            | Self::TaskAdvanced { id, .. }
            | Self::TaskRetrying { id, .. }
            | Self::TaskSkipped { id }
            | Self::TaskCompleted { id, .. }
            | Self::TaskFailed { id, .. } => *id,
        }
    }

    /// Whether this event ends the task's event stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TaskSkipped { .. } | Self::TaskCompleted { .. } | Self::TaskFailed { .. }
        )
    }

    /// Short kind label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "created",
            Self::TaskStarted { .. } => "started",
            Self::TaskAdvanced { .. } => "advanced",
            Self::TaskRetrying { .. } => "retrying",
            Self::TaskSkipped { .. } => "skipped",
            Self::TaskCompleted { .. } => "completed",
            Self::TaskFailed { .. } => "failed",
        }
    }
}
