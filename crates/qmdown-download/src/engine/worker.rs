//! Download worker pipeline.
//!
//! Executes one task: existence check, bounded retry loop, probe, streamed
//! transfer into a part file that is moved onto the target only when the
//! byte count matches. The worker operates on a dequeued [`QueuedTask`] and
//! borrowed [`WorkerDeps`], with no access to the engine's queue lock.
//!
//! Each task's snapshot is written only here, through the task's own
//! `watch::Sender`; sink events are emitted alongside every state change.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use qmdown_core::download::{DownloadError, ProgressEvent, TaskSnapshot, TaskState};
use qmdown_core::ports::{ByteStream, EngineConfig, HttpClientPort, HttpError, ProgressSinkPort};

use super::transfer::{Commit, PartFile, Tally};
use crate::queue::QueuedTask;

/// Dependencies shared by every worker.
pub struct WorkerDeps {
    /// Validated engine configuration.
    pub config: EngineConfig,
    /// Network adapter.
    pub http: Arc<dyn HttpClientPort>,
    /// Event receiver.
    pub sink: Arc<dyn ProgressSinkPort>,
    /// Engine-wide shutdown signal.
    pub cancel: CancellationToken,
    /// Counts transfers in progress.
    pub gauge: TransferGauge,
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The target was written in full.
    Completed {
        /// Bytes written.
        bytes: u64,
    },
    /// The target already existed.
    Skipped,
    /// The task gave up.
    Failed {
        /// Attempts made.
        attempts: u32,
        /// The last error.
        error: DownloadError,
    },
}

/// Number of transfers currently running, plus the highest value seen.
#[derive(Debug, Default)]
pub struct TransferGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl TransferGauge {
    /// Mark a transfer as started until the guard is dropped.
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }

    /// Transfers running right now.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous transfers observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Decrements the gauge on drop.
pub struct GaugeGuard<'a> {
    gauge: &'a TransferGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Why a single attempt did not produce a file.
enum AttemptFailure {
    /// Someone else created the target first.
    TargetExists,
    /// The attempt failed and may be retried.
    Error(DownloadError),
}

impl From<DownloadError> for AttemptFailure {
    fn from(err: DownloadError) -> Self {
        Self::Error(err)
    }
}

/// Run a task to a terminal state.
///
/// Never returns an error: every failure ends up in [`TaskOutcome::Failed`]
/// and in the task's snapshot.
pub async fn run_task(task: &QueuedTask, deps: &WorkerDeps) -> TaskOutcome {
    if deps.cancel.is_cancelled() {
        return fail_task(task, deps, 0, DownloadError::Cancelled);
    }
    tracing::debug!(
        target: "qmdown.download",
        id = %task.id,
        waited_ms = u64::try_from(task.queued_at.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Task picked up"
    );
    if target_exists(&task.target_path).await {
        return skip_task(task, deps);
    }

    let max_attempts = deps.config.retry_limit;
    let mut attempt = 0;
    loop {
        attempt += 1;
        transition(task, TaskState::Running, |s| {
            s.attempt = attempt;
            s.bytes_transferred = 0;
        });
        deps.sink.on_event(ProgressEvent::TaskStarted {
            id: task.id,
            attempt,
        });
        tracing::info!(
            target: "qmdown.download",
            id = %task.id,
            url = %task.source_url,
            attempt,
            "Starting download"
        );

        let result = {
            let _transfer = deps.gauge.enter();
            attempt_transfer(task, deps).await
        };

        let error = match result {
            Ok(bytes) => return complete_task(task, deps, bytes),
            Err(AttemptFailure::TargetExists) => return skip_task(task, deps),
            Err(AttemptFailure::Error(error)) => error,
        };

        if attempt >= max_attempts || !error.is_transient() || deps.cancel.is_cancelled() {
            return fail_task(task, deps, attempt, error);
        }

        let message = error.to_string();
        transition(task, TaskState::Retrying, |s| {
            s.last_error = Some(message.clone());
        });
        deps.sink.on_event(ProgressEvent::TaskRetrying {
            id: task.id,
            attempt,
            max_attempts,
            error: message,
        });

        let delay = deps.config.retry_delay(attempt);
        tracing::warn!(
            target: "qmdown.download",
            id = %task.id,
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Download attempt failed, retrying"
        );

        tokio::select! {
            biased;
            () = deps.cancel.cancelled() => return fail_task(task, deps, attempt, error),
            () = tokio::time::sleep(delay) => {}
        }

        if target_exists(&task.target_path).await {
            return skip_task(task, deps);
        }
    }
}

/// Move a task to `Failed` without (further) attempts.
pub fn fail_task(
    task: &QueuedTask,
    deps: &WorkerDeps,
    attempts: u32,
    error: DownloadError,
) -> TaskOutcome {
    let message = error.to_string();
    transition(task, TaskState::Failed, |s| {
        s.last_error = Some(message.clone());
    });
    deps.sink.on_event(ProgressEvent::TaskFailed {
        id: task.id,
        attempts,
        error: message,
    });
    if error.is_cancelled() {
        tracing::debug!(target: "qmdown.download", id = %task.id, "Task cancelled");
    } else {
        tracing::error!(
            target: "qmdown.download",
            id = %task.id,
            url = %task.source_url,
            attempts,
            error = %error,
            "Download failed"
        );
    }
    TaskOutcome::Failed { attempts, error }
}

fn skip_task(task: &QueuedTask, deps: &WorkerDeps) -> TaskOutcome {
    transition(task, TaskState::Skipped, |_| {});
    deps.sink.on_event(ProgressEvent::TaskSkipped { id: task.id });
    tracing::info!(
        target: "qmdown.download",
        id = %task.id,
        path = %task.target_path.display(),
        "Target exists, skipping"
    );
    TaskOutcome::Skipped
}

fn complete_task(task: &QueuedTask, deps: &WorkerDeps, bytes: u64) -> TaskOutcome {
    transition(task, TaskState::Completed, |s| {
        s.bytes_transferred = bytes;
        s.bytes_total = Some(bytes);
    });
    deps.sink.on_event(ProgressEvent::TaskCompleted { id: task.id, bytes });
    tracing::info!(
        target: "qmdown.download",
        id = %task.id,
        path = %task.target_path.display(),
        bytes,
        "Download complete"
    );
    TaskOutcome::Completed { bytes }
}

/// Apply a state change plus field updates in one publish.
fn transition(task: &QueuedTask, next: TaskState, update: impl FnOnce(&mut TaskSnapshot)) {
    task.status_tx.send_modify(|snapshot| {
        debug_assert!(
            snapshot.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            snapshot.state
        );
        snapshot.state = next;
        update(snapshot);
    });
}

/// One probe + stream + write pass.
///
/// Any part file it creates is either committed or removed before it
/// returns.
async fn attempt_transfer(task: &QueuedTask, deps: &WorkerDeps) -> Result<u64, AttemptFailure> {
    let timeout = deps.config.timeout;

    let probe = with_timeout("head", timeout, deps.http.probe(&task.source_url, timeout)).await?;
    if !probe.is_success() {
        return Err(DownloadError::network_with_status(
            format!("HEAD returned HTTP {}", probe.status),
            probe.status,
        )
        .into());
    }

    if let Some(parent) = task.target_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::from_io_error(&e))?;
    }

    let response =
        with_timeout("request", timeout, deps.http.stream(&task.source_url, timeout)).await?;
    if !response.is_success() {
        return Err(DownloadError::network_with_status(
            format!("GET returned HTTP {}", response.status),
            response.status,
        )
        .into());
    }

    // The GET describes the body actually being sent.
    let expected = response.content_length.or(probe.content_length);
    if probe.content_length.is_some() && probe.content_length != expected {
        tracing::debug!(
            target: "qmdown.download",
            id = %task.id,
            head = ?probe.content_length,
            get = ?expected,
            "HEAD and GET disagree on length"
        );
    }
    task.status_tx.send_modify(|s| s.bytes_total = expected);

    let mut part = PartFile::create(&task.target_path).await?;
    let bytes = match write_body(task, deps, response.body, expected, &mut part).await {
        Ok(bytes) => bytes,
        Err(e) => {
            part.discard().await;
            return Err(e.into());
        }
    };

    match part.commit(&task.target_path).await? {
        Commit::Placed => Ok(bytes),
        Commit::TargetExists => Err(AttemptFailure::TargetExists),
    }
}

/// Stream `body` into `part`, publishing progress as it goes.
///
/// Returns the byte count once it matches `expected`.
async fn write_body(
    task: &QueuedTask,
    deps: &WorkerDeps,
    mut body: ByteStream,
    expected: Option<u64>,
    part: &mut PartFile,
) -> Result<u64, DownloadError> {
    let timeout = deps.config.timeout;
    let mut tally = Tally::new(expected, deps.config.progress_interval);
    loop {
        let next = tokio::time::timeout(timeout, body.next())
            .await
            .map_err(|_| DownloadError::timeout("read", timeout))?;
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(|e| map_http_error("read", timeout, e))?;

        for piece in chunk.chunks(deps.config.chunk_size) {
            let transferred = tally.add(piece.len())?;
            part.write(piece).await?;
            task.status_tx.send_modify(|s| s.bytes_transferred = transferred);
            if tally.report_due() {
                deps.sink.on_event(ProgressEvent::TaskAdvanced {
                    id: task.id,
                    transferred,
                    total: tally.expected(),
                });
            }
        }
    }
    tally.finish()
}

async fn with_timeout<T>(
    operation: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T, HttpError>>,
) -> Result<T, DownloadError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(map_http_error(operation, limit, e)),
        Err(_) => Err(DownloadError::timeout(operation, limit)),
    }
}

fn map_http_error(operation: &str, limit: Duration, err: HttpError) -> DownloadError {
    match err {
        HttpError::Timeout => DownloadError::timeout(operation, limit),
        HttpError::Transport(message) | HttpError::Body(message) => {
            DownloadError::network(format!("{operation}: {message}"))
        }
    }
}

async fn target_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
