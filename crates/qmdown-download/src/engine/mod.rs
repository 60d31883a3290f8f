//! Concurrent download engine.
//!
//! Owns a FIFO of tasks and a fixed pool of workers that pull from it.
//!
//! # Architecture
//!
//! - `TaskQueue` behind a `Mutex`, `Notify` to wake idle workers
//! - `worker_count` workers spawned lazily on first enqueue
//! - A `Semaphore` with `worker_count` permits bounds simultaneous transfers
//! - Per-task `watch` channel publishes snapshots to its [`TaskHandle`]
//! - A `watch` counter of non-terminal tasks lets [`DownloadEngine::drain`]
//!   wait without polling
//!
//! Workers run until the engine is cancelled or dropped.

mod paths;
mod transfer;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Notify, Semaphore, watch};
use tokio_util::sync::CancellationToken;

use qmdown_core::download::{
    BatchSummary, DownloadError, FailedTask, ProgressEvent, TaskId, TaskSnapshot, TaskState,
};
use qmdown_core::ports::{EngineConfig, HttpClientPort, ProgressSinkPort};

use crate::queue::{QueuedTask, TaskQueue};

pub use paths::{plan_target, resolve_target, sanitize_file_name};
use worker::{TaskOutcome, TransferGauge, WorkerDeps};

/// Caller-side view of one enqueued task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    status: watch::Receiver<TaskSnapshot>,
}

impl TaskHandle {
    /// The task identifier.
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> TaskSnapshot {
        self.status.borrow().clone()
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.status.borrow().state
    }

    /// Wait until the task reaches a terminal state and return that snapshot.
    pub async fn wait(&mut self) -> TaskSnapshot {
        if let Ok(snapshot) = self.status.wait_for(|s| s.state.is_terminal()).await {
            return snapshot.clone();
        }
        self.status.borrow().clone()
    }
}

/// Shared state between the engine facade and its workers.
struct EngineInner {
    deps: WorkerDeps,
    queue: Mutex<TaskQueue>,
    queue_notify: Notify,
    workers_started: AtomicBool,
    transfer_slots: Semaphore,
    /// Tasks enqueued but not yet terminal.
    outstanding: watch::Sender<usize>,
    run: Mutex<BatchSummary>,
}

/// The download engine.
///
/// Dropping the engine cancels its workers.
pub struct DownloadEngine {
    inner: Arc<EngineInner>,
}

fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl DownloadEngine {
    /// Create an engine. Fails if `config` does not validate.
    ///
    /// A relative save dir is resolved against the current directory here,
    /// so every target path the engine hands out is absolute.
    pub fn new(
        mut config: EngineConfig,
        http: Arc<dyn HttpClientPort>,
        sink: Arc<dyn ProgressSinkPort>,
    ) -> Result<Self, DownloadError> {
        config.validate()?;
        config.save_dir =
            std::path::absolute(&config.save_dir).map_err(|e| DownloadError::from_io_error(&e))?;
        let slots = config.worker_count;
        let (outstanding, _) = watch::channel(0);

        Ok(Self {
            inner: Arc::new(EngineInner {
                deps: WorkerDeps {
                    config,
                    http,
                    sink,
                    cancel: CancellationToken::new(),
                    gauge: TransferGauge::default(),
                },
                queue: Mutex::new(TaskQueue::new()),
                queue_notify: Notify::new(),
                workers_started: AtomicBool::new(false),
                transfer_slots: Semaphore::new(slots),
                outstanding,
                run: Mutex::new(BatchSummary::new(new_run_id())),
            }),
        })
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.deps.config
    }

    /// Add a task. Relative `target` paths are joined onto the save dir.
    ///
    /// After [`cancel`](Self::cancel) the task fails immediately.
    pub async fn enqueue(
        &self,
        source_url: impl Into<String>,
        target: impl Into<PathBuf>,
    ) -> TaskHandle {
        let target_path = resolve_target(&self.inner.deps.config.save_dir, target);

        let mut queue = self.inner.queue.lock().await;
        let id = queue.allocate_id();
        let (task, status) = QueuedTask::new(id, source_url, target_path);
        self.inner.outstanding.send_modify(|n| *n += 1);
        self.inner.deps.sink.on_event(ProgressEvent::TaskCreated {
            id,
            name: task.snapshot().display_name(),
            target: task.target_path.clone(),
        });
        tracing::debug!(
            target: "qmdown.download",
            id = %id,
            url = %task.source_url,
            path = %task.target_path.display(),
            "Task queued"
        );

        if self.inner.deps.cancel.is_cancelled() {
            drop(queue);
            let outcome = worker::fail_task(&task, &self.inner.deps, 0, DownloadError::Cancelled);
            self.inner.finish(&task, outcome).await;
        } else {
            queue.push(task);
            drop(queue);
            self.inner.queue_notify.notify_one();
            self.inner.ensure_workers();
        }

        TaskHandle { id, status }
    }

    /// Wait until every enqueued task is terminal and return their summary.
    ///
    /// The engine stays usable afterwards; the next drain reports only tasks
    /// that finished after this one returned.
    pub async fn drain(&self) -> BatchSummary {
        let mut outstanding = self.inner.outstanding.subscribe();
        let _ = outstanding.wait_for(|n| *n == 0).await;

        let summary = {
            let mut run = self.inner.run.lock().await;
            std::mem::replace(&mut *run, BatchSummary::new(new_run_id()))
        };
        tracing::info!(
            target: "qmdown.download",
            run_id = %summary.run_id,
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed_count(),
            bytes = summary.bytes_transferred,
            "Batch drained"
        );
        summary
    }

    /// Stop the engine.
    ///
    /// Queued tasks fail with [`DownloadError::Cancelled`] without touching
    /// the network. Running tasks finish their current attempt but are not
    /// retried.
    pub async fn cancel(&self) {
        self.inner.deps.cancel.cancel();
        let queued = self.inner.queue.lock().await.take_all();
        tracing::info!(
            target: "qmdown.download",
            queued = queued.len(),
            running = self.inner.deps.gauge.current(),
            "Cancelling downloads"
        );
        for task in queued {
            let outcome = worker::fail_task(&task, &self.inner.deps, 0, DownloadError::Cancelled);
            self.inner.finish(&task, outcome).await;
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.deps.cancel.is_cancelled()
    }

    /// Tasks waiting for a worker.
    pub async fn pending_len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    /// Transfers running right now.
    pub fn in_flight(&self) -> usize {
        self.inner.deps.gauge.current()
    }

    /// Highest number of simultaneous transfers observed so far.
    pub fn peak_in_flight(&self) -> usize {
        self.inner.deps.gauge.peak()
    }
}

impl Drop for DownloadEngine {
    fn drop(&mut self) {
        self.inner.deps.cancel.cancel();
    }
}

impl EngineInner {
    /// Spawn the worker pool once.
    fn ensure_workers(self: &Arc<Self>) {
        if self
            .workers_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            for worker in 0..self.deps.config.worker_count {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    inner.worker_loop(worker).await;
                });
            }
        }
    }

    async fn worker_loop(&self, worker: usize) {
        tracing::debug!(target: "qmdown.download", worker, "Worker started");
        loop {
            let task = tokio::select! {
                biased;
                () = self.deps.cancel.cancelled() => break,
                task = self.next_task() => task,
            };

            let outcome = {
                let _permit = self.transfer_slots.acquire().await.ok();
                worker::run_task(&task, &self.deps).await
            };
            self.finish(&task, outcome).await;
        }
        tracing::debug!(target: "qmdown.download", worker, "Worker stopped");
    }

    async fn next_task(&self) -> QueuedTask {
        loop {
            let notified = self.queue_notify.notified();
            if let Some(task) = self.queue.lock().await.pop() {
                return task;
            }
            notified.await;
        }
    }

    /// Record a terminal outcome, then release the drain counter.
    async fn finish(&self, task: &QueuedTask, outcome: TaskOutcome) {
        {
            let mut run = self.run.lock().await;
            match outcome {
                TaskOutcome::Completed { bytes } => {
                    run.completed += 1;
                    run.bytes_transferred += bytes;
                }
                TaskOutcome::Skipped => run.skipped += 1,
                TaskOutcome::Failed { attempts, error } => run.failed.push(FailedTask {
                    id: task.id,
                    source_url: task.source_url.clone(),
                    target_path: task.target_path.clone(),
                    attempts,
                    error,
                }),
            }
        }
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::{StreamExt, stream};
    use mockall::mock;
    use mockall::predicate::function;
    use qmdown_core::ports::{
        HttpError, NoopProgressSink, ProbeResponse, RecordingProgressSink, StreamResponse,
    };

    use super::*;

    /// Scripted behaviour for one URL.
    #[derive(Clone)]
    struct Route {
        body: Vec<u8>,
        /// Number of leading GETs that fail mid-body.
        broken_streams: usize,
        /// Status for HEAD, and for GET unless `get_status` is set.
        status: u16,
        get_status: Option<u16>,
        head_length: Option<u64>,
        get_length: Option<u64>,
        head_delay: Duration,
        /// Delay before the GET responds.
        delay: Duration,
        /// GETs wait for a permit here before responding.
        gate: Option<Arc<Semaphore>>,
        /// Send this many bytes, then never finish the body.
        stall_after: Option<usize>,
    }

    impl Route {
        fn ok(body: &[u8]) -> Self {
            Self {
                body: body.to_vec(),
                broken_streams: 0,
                status: 200,
                get_status: None,
                head_length: Some(body.len() as u64),
                get_length: Some(body.len() as u64),
                head_delay: Duration::ZERO,
                delay: Duration::ZERO,
                gate: None,
                stall_after: None,
            }
        }
    }

    /// In-memory HTTP client.
    #[derive(Default)]
    struct FakeHttp {
        routes: StdMutex<HashMap<String, Route>>,
        probes: AtomicUsize,
        streams: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeHttp {
        fn with_route(self, url: &str, route: Route) -> Self {
            self.routes.lock().unwrap().insert(url.to_string(), route);
            self
        }

        fn route(&self, url: &str) -> Option<Route> {
            self.routes.lock().unwrap().get(url).cloned()
        }

        fn network_calls(&self) -> usize {
            self.probes.load(Ordering::SeqCst) + self.streams.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpClientPort for FakeHttp {
        async fn probe(&self, url: &str, _timeout: Duration) -> Result<ProbeResponse, HttpError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            let route = self
                .route(url)
                .ok_or_else(|| HttpError::Transport("no route".to_string()))?;
            tokio::time::sleep(route.head_delay).await;
            Ok(ProbeResponse {
                status: route.status,
                content_length: route.head_length,
            })
        }

        async fn stream(&self, url: &str, _timeout: Duration) -> Result<StreamResponse, HttpError> {
            self.streams.fetch_add(1, Ordering::SeqCst);
            let route = self
                .route(url)
                .ok_or_else(|| HttpError::Transport("no route".to_string()))?;

            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(gate) = &route.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            tokio::time::sleep(route.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            let status = route.get_status.unwrap_or(route.status);
            let content_length = route.get_length;

            if route.broken_streams > 0 {
                self.routes
                    .lock()
                    .unwrap()
                    .entry(url.to_string())
                    .and_modify(|r| r.broken_streams -= 1);
                let half = route.body[..route.body.len() / 2].to_vec();
                let chunks: Vec<Result<Bytes, HttpError>> = vec![
                    Ok(Bytes::from(half)),
                    Err(HttpError::Body("connection reset".to_string())),
                ];
                return Ok(StreamResponse {
                    status,
                    content_length,
                    body: Box::pin(stream::iter(chunks)),
                });
            }

            if let Some(sent) = route.stall_after {
                let head = Bytes::copy_from_slice(&route.body[..sent]);
                let body = stream::iter(vec![Ok::<_, HttpError>(head)]).chain(stream::pending());
                return Ok(StreamResponse {
                    status,
                    content_length,
                    body: Box::pin(body),
                });
            }

            let chunks: Vec<Result<Bytes, HttpError>> = route
                .body
                .chunks(7)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            Ok(StreamResponse {
                status,
                content_length,
                body: Box::pin(stream::iter(chunks)),
            })
        }
    }

    /// File names in `dir`, sorted.
    fn entries(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn advanced_within_total(events: &[ProgressEvent]) -> bool {
        events.iter().all(|e| match e {
            ProgressEvent::TaskAdvanced {
                transferred,
                total: Some(total),
                ..
            } => transferred <= total,
            _ => true,
        })
    }

    fn config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig::new(dir)
            .with_worker_count(2)
            .with_retry_limit(3)
            .with_retry_base_delay(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5))
    }

    fn engine(
        config: EngineConfig,
        http: Arc<FakeHttp>,
        sink: Arc<dyn ProgressSinkPort>,
    ) -> DownloadEngine {
        DownloadEngine::new(config, http, sink).unwrap()
    }

    #[tokio::test]
    async fn test_downloads_and_reports_completion() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"hello world, this is audio";
        let http = Arc::new(FakeHttp::default().with_route("u1", Route::ok(body)));
        let sink = Arc::new(RecordingProgressSink::new());
        let engine = engine(config(dir.path()), Arc::clone(&http), sink.clone());

        let mut handle = engine.enqueue("u1", "song.mp3").await;
        let summary = engine.drain().await;

        assert_eq!(summary.completed, 1);
        assert!(summary.is_success());
        let snapshot = handle.wait().await;
        assert_eq!(snapshot.state, TaskState::Completed);
        assert_eq!(snapshot.attempt, 1);
        assert_eq!(std::fs::read(dir.path().join("song.mp3")).unwrap(), body);
        assert_eq!(entries(dir.path()), vec!["song.mp3"]);

        let kinds: Vec<_> = sink.events().iter().map(ProgressEvent::kind).collect();
        assert_eq!(kinds.first(), Some(&"created"));
        assert_eq!(kinds.last(), Some(&"completed"));
        assert!(kinds.contains(&"advanced"));
    }

    #[tokio::test]
    async fn test_existing_target_is_skipped_without_network() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"old").unwrap();
        let http = Arc::new(FakeHttp::default().with_route("u1", Route::ok(b"new")));
        let engine = engine(config(dir.path()), Arc::clone(&http), Arc::new(NoopProgressSink));

        let handle = engine.enqueue("u1", "song.mp3").await;
        let summary = engine.drain().await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(handle.state(), TaskState::Skipped);
        assert_eq!(http.network_calls(), 0);
        assert_eq!(std::fs::read(dir.path().join("song.mp3")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_retry_limit_bounds_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let mut route = Route::ok(b"");
        route.status = 503;
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let engine = engine(config(dir.path()), Arc::clone(&http), Arc::new(NoopProgressSink));

        let mut handle = engine.enqueue("u1", "x.flac").await;
        let summary = engine.drain().await;

        assert_eq!(summary.failed_count(), 1);
        let failed = &summary.failed[0];
        assert_eq!(failed.attempts, 3);
        assert_eq!(failed.error.status_code(), Some(503));
        assert_eq!(http.probes.load(Ordering::SeqCst), 3);
        assert_eq!(http.streams.load(Ordering::SeqCst), 0);

        let snapshot = handle.wait().await;
        assert_eq!(snapshot.state, TaskState::Failed);
        assert!(snapshot.last_error.unwrap().contains("503"));
        assert!(!dir.path().join("x.flac").exists());
    }

    #[tokio::test]
    async fn test_broken_stream_is_retried_and_partial_removed() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut route = Route::ok(body);
        route.broken_streams = 1;
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let sink = Arc::new(RecordingProgressSink::new());
        let engine = engine(config(dir.path()), Arc::clone(&http), sink.clone());

        let mut handle = engine.enqueue("u1", "x.flac").await;
        let summary = engine.drain().await;

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.bytes_transferred, body.len() as u64);
        assert_eq!(handle.wait().await.attempt, 2);
        assert_eq!(std::fs::read(dir.path().join("x.flac")).unwrap(), body);
        assert!(
            sink.events()
                .iter()
                .any(|e| matches!(e, ProgressEvent::TaskRetrying { attempt: 1, .. }))
        );
    }

    #[tokio::test]
    async fn test_short_body_fails_as_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let mut route = Route::ok(b"short");
        route.head_length = Some(100);
        route.get_length = Some(100);
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let engine = engine(
            config(dir.path()).with_retry_limit(1),
            http,
            Arc::new(NoopProgressSink),
        );

        engine.enqueue("u1", "x.flac").await;
        let summary = engine.drain().await;

        assert_eq!(
            summary.failed[0].error,
            DownloadError::Incomplete {
                transferred: 5,
                expected: 100
            }
        );
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_get_length_wins_over_head_length() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"twenty bytes of song";
        let mut route = Route::ok(body);
        route.head_length = Some(10);
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let sink = Arc::new(RecordingProgressSink::new());
        let engine = engine(config(dir.path()).with_chunk_size(4), http, sink.clone());

        let mut handle = engine.enqueue("u1", "x.flac").await;
        let summary = engine.drain().await;

        assert_eq!(summary.completed, 1);
        let snapshot = handle.wait().await;
        assert_eq!(snapshot.bytes_total, Some(20));
        assert_eq!(snapshot.bytes_transferred, 20);
        assert_eq!(std::fs::read(dir.path().join("x.flac")).unwrap(), body);
        assert!(advanced_within_total(&sink.events()));
    }

    #[tokio::test]
    async fn test_body_longer_than_advertised_stops_at_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut route = Route::ok(b"twenty bytes of song");
        route.head_length = Some(10);
        route.get_length = Some(10);
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let sink = Arc::new(RecordingProgressSink::new());
        let engine = engine(
            config(dir.path()).with_chunk_size(4).with_retry_limit(1),
            http,
            sink.clone(),
        );

        let mut handle = engine.enqueue("u1", "x.flac").await;
        let summary = engine.drain().await;

        // First 7-byte chunk is written as 4 + 3; the next piece would reach 11.
        assert_eq!(
            summary.failed[0].error,
            DownloadError::Incomplete {
                transferred: 11,
                expected: 10
            }
        );
        let snapshot = handle.wait().await;
        assert_eq!(snapshot.bytes_transferred, 7);
        assert_eq!(snapshot.bytes_total, Some(10));
        assert!(advanced_within_total(&sink.events()));
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_transfer_never_leaves_target() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"0123456789abcdef";
        let target = dir.path().join("x.flac");

        let mut stalled = Route::ok(body);
        stalled.stall_after = Some(8);
        let first = engine(
            config(dir.path()).with_timeout(Duration::from_secs(60)),
            Arc::new(FakeHttp::default().with_route("u1", stalled)),
            Arc::new(NoopProgressSink),
        );
        let handle = first.enqueue("u1", "x.flac").await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.snapshot().bytes_transferred == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("transfer never started");

        // Abandon the run mid-body.
        drop(first);
        assert!(!target.exists());

        let second = engine(
            config(dir.path()),
            Arc::new(FakeHttp::default().with_route("u1", Route::ok(body))),
            Arc::new(NoopProgressSink),
        );
        let mut handle = second.enqueue("u1", "x.flac").await;
        let summary = second.drain().await;

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(handle.wait().await.state, TaskState::Completed);
        assert_eq!(std::fs::read(&target).unwrap(), body);
    }

    #[tokio::test(start_paused = true)]
    async fn test_head_timeout_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut route = Route::ok(b"abc");
        route.head_delay = Duration::from_secs(60);
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let engine = engine(
            config(dir.path()).with_timeout(Duration::from_secs(1)),
            Arc::clone(&http),
            Arc::new(NoopProgressSink),
        );

        engine.enqueue("u1", "x.flac").await;
        let summary = engine.drain().await;

        let failed = &summary.failed[0];
        assert_eq!(failed.attempts, 3);
        assert_eq!(failed.error, DownloadError::timeout("head", Duration::from_secs(1)));
        assert_eq!(http.probes.load(Ordering::SeqCst), 3);
        assert_eq!(http.streams.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut route = Route::ok(b"abc");
        route.delay = Duration::from_secs(60);
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let engine = engine(
            config(dir.path()).with_timeout(Duration::from_millis(500)),
            Arc::clone(&http),
            Arc::new(NoopProgressSink),
        );

        engine.enqueue("u1", "x.flac").await;
        let summary = engine.drain().await;

        let failed = &summary.failed[0];
        assert_eq!(failed.attempts, 3);
        assert_eq!(
            failed.error,
            DownloadError::timeout("request", Duration::from_millis(500))
        );
        assert!(failed.error.to_string().contains("500ms"));
        assert_eq!(http.streams.load(Ordering::SeqCst), 3);
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_get_error_status_is_retried_then_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut route = Route::ok(b"abc");
        route.get_status = Some(500);
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let engine = engine(
            config(dir.path()).with_retry_limit(2),
            Arc::clone(&http),
            Arc::new(NoopProgressSink),
        );

        let mut handle = engine.enqueue("u1", "x.flac").await;
        let summary = engine.drain().await;

        let failed = &summary.failed[0];
        assert_eq!(failed.attempts, 2);
        assert_eq!(failed.error.status_code(), Some(500));
        assert_eq!(http.probes.load(Ordering::SeqCst), 2);
        assert_eq!(http.streams.load(Ordering::SeqCst), 2);
        assert_eq!(handle.wait().await.state, TaskState::Failed);
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_head_creates_no_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut route = Route::ok(b"");
        route.status = 404;
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let engine = engine(
            config(dir.path()).with_retry_limit(1),
            http,
            Arc::new(NoopProgressSink),
        );

        engine.enqueue("u1", "deep/dir/x.flac").await;
        let summary = engine.drain().await;

        assert_eq!(summary.failed_count(), 1);
        assert!(!dir.path().join("deep").exists());
    }

    #[tokio::test]
    async fn test_nested_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::default().with_route("u1", Route::ok(b"abc")));
        let engine = engine(config(dir.path()), http, Arc::new(NoopProgressSink));

        engine.enqueue("u1", "a/b/c/song.flac").await;
        let summary = engine.drain().await;

        assert_eq!(summary.completed, 1);
        assert!(dir.path().join("a/b/c/song.flac").is_file());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_worker_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut http = FakeHttp::default();
        for i in 0..12 {
            let mut route = Route::ok(b"payload");
            route.delay = Duration::from_millis(20);
            http = http.with_route(&format!("u{i}"), route);
        }
        let http = Arc::new(http);
        let engine = engine(
            config(dir.path()).with_worker_count(3),
            Arc::clone(&http),
            Arc::new(NoopProgressSink),
        );

        for i in 0..12 {
            engine.enqueue(format!("u{i}"), format!("{i}.mp3")).await;
        }
        let summary = engine.drain().await;

        assert_eq!(summary.completed, 12);
        assert!(engine.peak_in_flight() <= 3);
        assert!(http.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(engine.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_drain_with_nothing_queued_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(
            config(dir.path()),
            Arc::new(FakeHttp::default()),
            Arc::new(NoopProgressSink),
        );
        let summary = engine.drain().await;
        assert_eq!(summary.total(), 0);
    }

    #[tokio::test]
    async fn test_each_drain_gets_fresh_run() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(
            FakeHttp::default()
                .with_route("u1", Route::ok(b"a"))
                .with_route("u2", Route::ok(b"b")),
        );
        let engine = engine(config(dir.path()), http, Arc::new(NoopProgressSink));

        engine.enqueue("u1", "1.mp3").await;
        let first = engine.drain().await;
        engine.enqueue("u2", "2.mp3").await;
        let second = engine.drain().await;

        assert_eq!(first.completed, 1);
        assert_eq!(second.completed, 1);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_cancel_fails_queued_tasks_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(FakeHttp::default().with_route("u1", Route::ok(b"a")));
        let engine = engine(config(dir.path()), Arc::clone(&http), Arc::new(NoopProgressSink));

        engine.cancel().await;
        let handle = engine.enqueue("u1", "1.mp3").await;
        let summary = engine.drain().await;

        assert!(engine.is_cancelled());
        assert_eq!(handle.state(), TaskState::Failed);
        assert_eq!(summary.cancelled_count(), 1);
        assert_eq!(summary.failed[0].attempts, 0);
        assert_eq!(http.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_attempt_failing_after_cancel_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let mut route = Route::ok(b"0123456789");
        route.broken_streams = 1;
        route.gate = Some(Arc::clone(&gate));
        let http = Arc::new(FakeHttp::default().with_route("u1", route));
        let engine = engine(config(dir.path()), Arc::clone(&http), Arc::new(NoopProgressSink));

        let mut handle = engine.enqueue("u1", "x.flac").await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while engine.in_flight() == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("attempt never started");

        engine.cancel().await;
        gate.add_permits(1);
        let summary = engine.drain().await;

        let failed = &summary.failed[0];
        assert_eq!(failed.attempts, 1);
        assert!(matches!(failed.error, DownloadError::Network { .. }));
        assert_eq!(summary.cancelled_count(), 0);
        assert_eq!(http.streams.load(Ordering::SeqCst), 1);
        assert_eq!(handle.wait().await.state, TaskState::Failed);
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_relative_save_dir_becomes_absolute() {
        let engine = DownloadEngine::new(
            EngineConfig::new("music"),
            Arc::new(FakeHttp::default()),
            Arc::new(NoopProgressSink),
        )
        .unwrap();
        let save_dir = &engine.config().save_dir;
        assert!(save_dir.is_absolute());
        assert!(save_dir.ends_with("music"));
        assert!(resolve_target(save_dir, "a.flac").is_absolute());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = DownloadEngine::new(
            EngineConfig::new("/tmp").with_worker_count(0),
            Arc::new(FakeHttp::default()),
            Arc::new(NoopProgressSink),
        );
        assert!(matches!(result, Err(DownloadError::InvalidConfig { .. })));
    }

    mock! {
        Sink {}
        impl ProgressSinkPort for Sink {
            fn on_event(&self, event: ProgressEvent);
        }
    }

    #[tokio::test]
    async fn test_skip_emits_created_then_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("have.mp3"), b"x").unwrap();

        let mut sink = MockSink::new();
        let mut seq = mockall::Sequence::new();
        sink.expect_on_event()
            .with(function(|e: &ProgressEvent| e.kind() == "created"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        sink.expect_on_event()
            .with(function(|e: &ProgressEvent| e.kind() == "skipped"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let engine = engine(
            config(dir.path()),
            Arc::new(FakeHttp::default()),
            Arc::new(sink),
        );
        engine.enqueue("u1", "have.mp3").await;
        engine.drain().await;
    }
}
