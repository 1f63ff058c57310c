//! Push-based change notification layered over polling.
//!
//! Followers poll on a fixed interval regardless; a [`FileWatcher`] only lets
//! them poll sooner when the OS reports activity on their file.

use crate::error::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;

/// Watches a file's parent directory and reports events touching the file.
pub(crate) struct FileWatcher {
    watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    file_path: PathBuf,
    file_name: String,
}

impl FileWatcher {
    /// Set up a watcher for `path` without registering it yet.
    pub(crate) fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher,
            receiver: rx,
            file_path,
            file_name,
        })
    }

    /// Creates a watcher and starts watching in one step.
    pub(crate) fn watch<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut watcher = Self::new(path)?;
        watcher.start_watching()?;
        Ok(watcher)
    }

    /// Starts watching the file's directory for changes.
    pub(crate) fn start_watching(&mut self) -> Result<()> {
        let watch_path = match self.file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        self.watcher.watch(watch_path, RecursiveMode::NonRecursive)?;
        Ok(())
    }

    /// Waits for the next event that concerns the watched file.
    ///
    /// Returns `None` once the underlying watcher has shut down.
    pub(crate) async fn next_change(&mut self) -> Option<()> {
        loop {
            match self.receiver.recv().await? {
                Ok(event) if is_event_relevant_to_file(&event, &self.file_name) => return Some(()),
                Ok(_) => continue,
                Err(e) => {
                    debug!(
                        path = %self.file_path.display(),
                        error = %e,
                        "file watcher reported an error"
                    );
                    continue;
                }
            }
        }
    }

    #[cfg(test)]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Whether any path in `event` has `target_file_name` as its base name.
pub(crate) fn is_event_relevant_to_file(event: &Event, target_file_name: &str) -> bool {
    event.paths.iter().any(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy() == target_file_name)
            .unwrap_or(false)
    })
}
