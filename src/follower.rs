//! Follower: the task that incrementally reads one file's growth.
//!
//! A follower is `Opened` when the manager hands it a file handle, `Polling`
//! while its loop runs, and `Closed` once cancelled or after an I/O failure.
//! Failures end only this follower's loop.

use crate::error::{Error, Result};
use crate::reader::read_complete_lines;
use crate::router::Outbox;
use crate::watcher::FileWatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-follower knobs taken from the manager's options.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FollowSettings {
    pub poll_interval: Duration,
    pub watch_events: bool,
}

pub(crate) struct Follower {
    path: PathBuf,
    file: File,
    offset: u64,
    lines_read: Arc<AtomicU64>,
    outbox: Arc<Outbox>,
}

impl Follower {
    /// A follower that starts reading at byte `offset`.
    ///
    /// Tail-only followers are given the file length measured when the file
    /// was opened, so anything appended afterwards is read.
    pub(crate) fn new(
        path: PathBuf,
        file: File,
        offset: u64,
        outbox: Arc<Outbox>,
        lines_read: Arc<AtomicU64>,
    ) -> Self {
        Self {
            path,
            file,
            offset,
            lines_read,
            outbox,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// One iteration: flush overflow, read complete lines, emit them.
    ///
    /// Returns the number of lines emitted.
    pub(crate) async fn poll(&mut self) -> Result<usize> {
        self.outbox.flush()?;

        let chunk = read_complete_lines(&mut self.file, &mut self.offset)
            .await
            .map_err(|e| Error::follower_io(&self.path, e))?;

        if chunk.truncated {
            info!(path = %self.path.display(), "file shrank below read cursor; reading from start");
        }

        let count = chunk.lines.len();
        if count > 0 {
            self.outbox.emit(chunk.lines)?;
            self.lines_read.fetch_add(count as u64, Ordering::Relaxed);
        }
        Ok(count)
    }

    /// Poll until cancelled. The file handle is released when this returns.
    pub(crate) async fn run(mut self, settings: FollowSettings, cancel: CancellationToken) {
        let mut watcher = if settings.watch_events {
            match FileWatcher::watch(&self.path) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    debug!(
                        path = %self.path.display(),
                        error = %e,
                        "change notifications unavailable; polling only"
                    );
                    None
                }
            }
        } else {
            None
        };

        debug!(path = %self.path.display(), offset = self.offset, "follower polling");

        while !cancel.is_cancelled() {
            match self.poll().await {
                Ok(_) => {}
                Err(Error::Closed) => break,
                Err(e) => {
                    warn!(error = %e, "follower stopped");
                    break;
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(settings.poll_interval) => {}
                _ = next_change(watcher.as_mut()) => {}
            }
        }

        debug!(path = %self.path.display(), "follower closed");
    }
}

/// Resolves on the next relevant notification; never resolves without a watcher.
async fn next_change(watcher: Option<&mut FileWatcher>) {
    if let Some(watcher) = watcher {
        if watcher.next_change().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}
