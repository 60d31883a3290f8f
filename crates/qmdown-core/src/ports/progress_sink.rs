//! Progress sink port.
//!
//! This port abstracts task event delivery, allowing the download engine
//! to report lifecycle changes without coupling to a renderer (terminal
//! bars, log lines).

use std::sync::Mutex;

use crate::download::ProgressEvent;

/// Port for receiving task lifecycle events.
///
/// Called from worker tasks; implementations must be fire-and-forget and
/// must not block beyond negligible bookkeeping.
pub trait ProgressSinkPort: Send + Sync {
    /// Receive one event.
    fn on_event(&self, event: ProgressEvent);
}

/// A sink that discards all events, for tests and quiet runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressSink;

impl NoopProgressSink {
    /// Create a new no-op sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProgressSinkPort for NoopProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// A sink that records every event in memory.
#[derive(Debug, Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgressSink {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSinkPort for RecordingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
