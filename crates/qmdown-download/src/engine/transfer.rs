//! Bytes on disk for a single attempt.
//!
//! A body is streamed into a hidden sibling of the target
//! (`.<name>.<uuid>.part`) and only linked into place once its length checks
//! out. The target path therefore never holds a partial file, even when the
//! process dies mid-transfer.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use qmdown_core::download::DownloadError;

/// How a finished part file ended up.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Commit {
    /// The target now holds the downloaded bytes.
    Placed,
    /// Something else created the target first; it was left alone.
    TargetExists,
}

/// Temporary file an attempt writes into.
pub(super) struct PartFile {
    path: PathBuf,
    file: File,
}

impl PartFile {
    /// Create a fresh part file next to `target`.
    pub(super) async fn create(target: &Path) -> Result<Self, DownloadError> {
        let path = part_path(target);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| DownloadError::from_io_error(&e))?;
        Ok(Self { path, file })
    }

    pub(super) async fn write(&mut self, bytes: &[u8]) -> Result<(), DownloadError> {
        self.file
            .write_all(bytes)
            .await
            .map_err(|e| DownloadError::from_io_error(&e))
    }

    /// Flush and move onto `target` without replacing an existing file.
    ///
    /// The part file is gone afterwards whatever the result.
    pub(super) async fn commit(self, target: &Path) -> Result<Commit, DownloadError> {
        let Self { path, mut file } = self;
        let flushed = file.flush().await;
        drop(file);

        let placed = match flushed {
            Ok(()) => place(&path, target).await,
            Err(e) => Err(DownloadError::from_io_error(&e)),
        };
        remove_quietly(&path).await;
        placed
    }

    /// Close and delete the part file.
    pub(super) async fn discard(self) {
        let Self { path, file } = self;
        drop(file);
        remove_quietly(&path).await;
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_name().unwrap_or_default());
    name.push(format!(".{}.part", uuid::Uuid::new_v4().simple()));
    target.with_file_name(name)
}

async fn place(part: &Path, target: &Path) -> Result<Commit, DownloadError> {
    // hard_link refuses to overwrite, unlike rename.
    match tokio::fs::hard_link(part, target).await {
        Ok(()) => Ok(Commit::Placed),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(Commit::TargetExists),
        Err(e) => {
            tracing::debug!(
                target: "qmdown.download",
                path = %target.display(),
                error = %e,
                "Hard link unavailable, renaming instead"
            );
            if tokio::fs::try_exists(target).await.unwrap_or(false) {
                return Ok(Commit::TargetExists);
            }
            tokio::fs::rename(part, target)
                .await
                .map(|()| Commit::Placed)
                .map_err(|e| DownloadError::from_io_error(&e))
        }
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(
                target: "qmdown.download",
                path = %path.display(),
                "Removed part file"
            );
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                target: "qmdown.download",
                path = %path.display(),
                error = %e,
                "Failed to remove part file"
            );
        }
    }
}

/// Byte count of one attempt, held to the advertised length.
///
/// Also paces `TaskAdvanced` events: one is due at most every
/// `report_every`; a zero interval makes every chunk due.
#[derive(Debug)]
pub(super) struct Tally {
    transferred: u64,
    expected: Option<u64>,
    report_every: Duration,
    next_report: Instant,
}

impl Tally {
    pub(super) fn new(expected: Option<u64>, report_every: Duration) -> Self {
        Self {
            transferred: 0,
            expected,
            report_every,
            next_report: Instant::now(),
        }
    }

    pub(super) const fn expected(&self) -> Option<u64> {
        self.expected
    }

    /// Count `len` more bytes. Refuses, without counting, when that would
    /// run past the expected length.
    pub(super) fn add(&mut self, len: usize) -> Result<u64, DownloadError> {
        let next = self.transferred + len as u64;
        if let Some(expected) = self.expected {
            if next > expected {
                return Err(DownloadError::Incomplete {
                    transferred: next,
                    expected,
                });
            }
        }
        self.transferred = next;
        Ok(next)
    }

    pub(super) fn report_due(&mut self) -> bool {
        let now = Instant::now();
        if now < self.next_report {
            return false;
        }
        self.next_report = now + self.report_every;
        true
    }

    /// Final count; fails when the body ended short.
    pub(super) fn finish(&self) -> Result<u64, DownloadError> {
        match self.expected {
            Some(expected) if self.transferred != expected => Err(DownloadError::Incomplete {
                transferred: self.transferred,
                expected,
            }),
            _ => Ok(self.transferred),
        }
    }
}
