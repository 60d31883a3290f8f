//! Task identity and lifecycle types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier of one file transfer within an engine.
///
/// Ids are minted by the engine in enqueue order and are only unique
/// within that engine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle state of a download task.
///
/// ```text
/// Pending ──► Skipped
///    │
///    ▼
/// Running ──► Completed
///  ▲   │
///  │   ├────► Failed
///  │   ▼
/// Retrying
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in the queue.
    #[default]
    Pending,
    /// An attempt is in progress.
    Running,
    /// The last attempt failed; another one is scheduled.
    Retrying,
    /// The target already existed; nothing was fetched.
    Skipped,
    /// The file was written in full.
    Completed,
    /// Every attempt failed, or the engine was cancelled.
    Failed,
}

impl TaskState {
    /// Whether no further transition can occur.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Completed | Self::Failed)
    }

    /// Whether `self → next` is a legal transition.
    ///
    /// `Pending → Failed` is allowed for tasks cancelled before they ran,
    /// and `Retrying → Skipped`/`Failed` for a retry that finds the target
    /// already claimed or is cut short by shutdown.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Skipped | Self::Running | Self::Failed)
                | (Self::Running, Self::Completed | Self::Retrying | Self::Failed | Self::Skipped)
                | (Self::Retrying, Self::Running | Self::Skipped | Self::Failed)
        )
    }

    /// String form used in logs and serialized snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Skipped => "skipped",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a download task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// The task identifier.
    pub id: TaskId,
    /// Where the bytes come from. Never changes after creation.
    pub source_url: String,
    /// Absolute destination path.
    pub target_path: PathBuf,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Expected size from the probe, when the server reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_total: Option<u64>,
    /// Bytes written during the current attempt.
    pub bytes_transferred: u64,
    /// 1-based attempt number; 0 until the first attempt starts.
    pub attempt: u32,
    /// Last error message, set on `Retrying` and `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TaskSnapshot {
    /// Snapshot of a freshly enqueued task.
    pub fn pending(id: TaskId, source_url: impl Into<String>, target_path: PathBuf) -> Self {
        Self {
            id,
            source_url: source_url.into(),
            target_path,
            state: TaskState::Pending,
            bytes_total: None,
            bytes_transferred: 0,
            attempt: 0,
            last_error: None,
        }
    }

    /// Display name for progress rendering (the target's file name).
    pub fn display_name(&self) -> String {
        self.target_path.file_name().map_or_else(
            || self.target_path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    /// Fraction complete in `0.0..=1.0`, if the total is known and nonzero.
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        match self.bytes_total {
            Some(total) if total > 0 => {
                #[allow(clippy::cast_precision_loss)]
                let fraction = self.bytes_transferred as f64 / total as f64;
                Some(fraction.min(1.0))
            }
            _ => None,
        }
    }
}
