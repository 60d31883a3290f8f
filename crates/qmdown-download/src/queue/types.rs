//! Queue item types (internal implementation).

use std::path::PathBuf;

use tokio::sync::watch;
use tokio::time::Instant;

use qmdown_core::download::{TaskId, TaskSnapshot};

/// A task waiting for a worker.
///
/// Owns the sending half of the task's status channel; whoever pops the
/// item from the queue becomes the only writer of its snapshot.
#[derive(Debug)]
pub struct QueuedTask {
    /// The task identifier.
    pub id: TaskId,
    /// Where to download from.
    pub source_url: String,
    /// Absolute destination path.
    pub target_path: PathBuf,
    /// When this item was queued (for ordering/debugging).
    pub queued_at: Instant,
    /// Status publisher backing the task's handle.
    pub status_tx: watch::Sender<TaskSnapshot>,
}

impl QueuedTask {
    /// Create a queued task and the receiver observing it.
    pub fn new(
        id: TaskId,
        source_url: impl Into<String>,
        target_path: PathBuf,
    ) -> (Self, watch::Receiver<TaskSnapshot>) {
        let source_url = source_url.into();
        let (status_tx, status_rx) = watch::channel(TaskSnapshot::pending(
            id,
            source_url.clone(),
            target_path.clone(),
        ));
        let task = Self {
            id,
            source_url,
            target_path,
            queued_at: Instant::now(),
            status_tx,
        };
        (task, status_rx)
    }

    /// Current snapshot of this task.
    pub fn snapshot(&self) -> TaskSnapshot {
        self.status_tx.borrow().clone()
    }
}
