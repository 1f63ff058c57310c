//! The owning manager: followers, router, buffer, groups and their lifecycle.
//!
//! One [`TailManager`] is built at startup and cloned into whatever needs it;
//! all shared state lives behind its explicit locks.

use crate::buffer::{self, HistoryBuffer};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::follower::{FollowSettings, Follower};
use crate::groups::GroupRegistry;
use crate::query::PatternCache;
use crate::router::{self, Outbox};
use crate::source::{self, SourceConfig};
use crate::stream::EntryStream;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Engine tuning. `Default` gives the documented defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailOptions {
    /// Entries retained by the history buffer.
    pub buffer_capacity: usize,
    /// Bound of the router ingress and of each live subscription.
    pub router_capacity: usize,
    /// Entries a source may park while the router is full before dropping the oldest.
    pub overflow_capacity: usize,
    /// Delay between follower polls.
    pub poll_interval: Duration,
    /// Delay between rescans of sources that matched no files.
    pub rescan_interval: Duration,
    /// Skip content already present when a file is first followed.
    pub tail_only: bool,
    /// Poll early on file-change notifications when available.
    pub watch_events: bool,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: buffer::DEFAULT_CAPACITY,
            router_capacity: 10_000,
            overflow_capacity: 1_000,
            poll_interval: Duration::from_millis(100),
            rescan_interval: Duration::from_secs(5),
            tail_only: false,
            watch_events: true,
        }
    }
}

impl TailOptions {
    fn follow_settings(&self) -> FollowSettings {
        FollowSettings {
            poll_interval: self.poll_interval,
            watch_events: self.watch_events,
        }
    }
}

/// What `list_sources` reports for one followed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub name: String,
    pub tags: Vec<String>,
    pub color: String,
    pub lines_read: u64,
}

/// Counters reported by [`TailManager::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Followed files.
    pub source_count: usize,
    pub group_count: usize,
    pub buffer_size: usize,
    /// Entries discarded by full overflow queues since startup.
    pub overflow_dropped: u64,
    /// Entries the history buffer missed because its drain fell behind the router.
    pub drain_skipped: u64,
}

struct FollowedFile {
    source: Arc<SourceConfig>,
    lines_read: Arc<AtomicU64>,
}

pub(crate) struct Inner {
    pub(crate) options: TailOptions,
    pub(crate) buffer: Arc<HistoryBuffer>,
    pub(crate) groups: GroupRegistry,
    pub(crate) patterns: PatternCache,
    followers: RwLock<HashMap<PathBuf, FollowedFile>>,
    outboxes: Mutex<HashMap<String, Arc<Outbox>>>,
    rescanning: Mutex<HashSet<String>>,
    ingress: mpsc::Sender<Entry>,
    live: RwLock<Option<broadcast::Sender<Entry>>>,
    overflow_dropped: Arc<AtomicU64>,
    drain_skipped: Arc<AtomicU64>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

/// Handle to the tailing engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct TailManager {
    pub(crate) inner: Arc<Inner>,
}

impl TailManager {
    /// Build the engine and start its router and buffer drain tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(options: TailOptions) -> Self {
        let router_capacity = options.router_capacity.max(1);
        let (ingress, ingress_rx) = mpsc::channel(router_capacity);
        let (live, drain_rx) = broadcast::channel(router_capacity);

        let buffer = Arc::new(HistoryBuffer::with_capacity(options.buffer_capacity));
        let drain_skipped = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();

        tasks.spawn(router::dispatch(ingress_rx, live.clone(), cancel.clone()));
        tasks.spawn(drain_into_buffer(
            drain_rx,
            Arc::clone(&buffer),
            Arc::clone(&drain_skipped),
            cancel.clone(),
        ));

        info!(
            buffer_capacity = buffer.capacity(),
            router_capacity,
            tail_only = options.tail_only,
            "tail manager started"
        );

        Self {
            inner: Arc::new(Inner {
                options,
                buffer,
                groups: GroupRegistry::new(),
                patterns: PatternCache::default(),
                followers: RwLock::new(HashMap::new()),
                outboxes: Mutex::new(HashMap::new()),
                rescanning: Mutex::new(HashSet::new()),
                ingress,
                live: RwLock::new(Some(live)),
                overflow_dropped: Arc::new(AtomicU64::new(0)),
                drain_skipped,
                cancel,
                tasks,
            }),
        }
    }

    pub fn options(&self) -> &TailOptions {
        &self.inner.options
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Start following every file `source` currently matches.
    ///
    /// Returns how many new followers were started. Discovery failures and
    /// per-file open failures are logged and skipped. A source that matches
    /// nothing is rescanned on `rescan_interval` until shutdown, with at most
    /// one rescan loop per source name.
    pub async fn tail(&self, source: SourceConfig) -> Result<usize> {
        self.ensure_open()?;
        let source = Arc::new(source);

        let paths = resolve_logged(&source).await;
        let started = self.follow_paths(&source, &paths).await;

        if paths.is_empty() && self.inner.rescanning.lock().insert(source.name.clone()) {
            debug!(
                source = %source.name,
                dir = %source.path.display(),
                "no matching files yet; rescanning"
            );
            self.inner.tasks.spawn(rescan(self.clone(), Arc::clone(&source)));
        }

        Ok(started)
    }

    async fn follow_paths(&self, source: &Arc<SourceConfig>, paths: &BTreeSet<PathBuf>) -> usize {
        let mut started = 0;
        for path in paths {
            match self.add_file(source, path).await {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(Error::Closed) => break,
                Err(e) => warn!(source = %source.name, error = %e, "skipping file"),
            }
        }
        started
    }

    /// Open `path` and spawn its follower. `Ok(false)` if it is already followed.
    ///
    /// In tail-only mode the starting offset is the file length at open time.
    async fn add_file(&self, source: &Arc<SourceConfig>, path: &Path) -> Result<bool> {
        self.ensure_open()?;
        if self.inner.followers.read().contains_key(path) {
            return Ok(false);
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::follower_io(path, e))?;
        let offset = if self.inner.options.tail_only {
            file.metadata().await.map_err(|e| Error::follower_io(path, e))?.len()
        } else {
            0
        };

        let lines_read = Arc::new(AtomicU64::new(0));
        {
            let mut followers = self.inner.followers.write();
            // Another scan may have claimed the path while this one was opening it.
            if followers.contains_key(path) {
                return Ok(false);
            }
            followers.insert(
                path.to_path_buf(),
                FollowedFile {
                    source: Arc::clone(source),
                    lines_read: Arc::clone(&lines_read),
                },
            );
        }

        let follower = Follower::new(
            path.to_path_buf(),
            file,
            offset,
            self.outbox_for(source),
            lines_read,
        );
        info!(source = %source.name, path = %follower.path().display(), offset, "following file");
        self.inner.tasks.spawn(
            follower.run(self.inner.options.follow_settings(), self.inner.cancel.child_token()),
        );
        Ok(true)
    }

    fn outbox_for(&self, source: &SourceConfig) -> Arc<Outbox> {
        let mut outboxes = self.inner.outboxes.lock();
        let outbox = outboxes.entry(source.name.clone()).or_insert_with(|| {
            Arc::new(Outbox::new(
                source.name.as_str(),
                source.tags.clone(),
                self.inner.ingress.clone(),
                self.inner.options.overflow_capacity,
                Arc::clone(&self.inner.overflow_dropped),
            ))
        });
        Arc::clone(outbox)
    }

    /// Live entries from this moment on. Ends after shutdown.
    pub fn subscribe(&self) -> Result<EntryStream> {
        self.ensure_open()?;
        match self.inner.live.read().as_ref() {
            Some(live) => Ok(EntryStream::new(live.subscribe())),
            None => Err(Error::Closed),
        }
    }

    /// Every followed file, keyed by path.
    pub fn list_sources(&self) -> Result<BTreeMap<PathBuf, SourceInfo>> {
        self.ensure_open()?;
        let followers = self.inner.followers.read();
        Ok(followers
            .iter()
            .map(|(path, followed)| {
                let info = SourceInfo {
                    name: followed.source.name.clone(),
                    tags: followed.source.tags.clone(),
                    color: followed.source.color.clone(),
                    lines_read: followed.lines_read.load(Ordering::Relaxed),
                };
                (path.clone(), info)
            })
            .collect())
    }

    pub fn stats(&self) -> Result<Stats> {
        self.ensure_open()?;
        Ok(Stats {
            source_count: self.inner.followers.read().len(),
            group_count: self.inner.groups.len(),
            buffer_size: self.inner.buffer.len(),
            overflow_dropped: self.inner.overflow_dropped.load(Ordering::Relaxed),
            drain_skipped: self.inner.drain_skipped.load(Ordering::Relaxed),
        })
    }

    /// Stop every follower, rescan and drain task and wait for them to exit.
    ///
    /// Live streams end once drained; later queries fail with `Closed`.
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        if !self.inner.cancel.is_cancelled() {
            info!("tail manager shutting down");
        }
        self.inner.cancel.cancel();
        self.inner.live.write().take();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        debug!("all tail manager tasks stopped");
    }
}

/// Resolve on the blocking pool; failures are logged and treated as no matches.
async fn resolve_logged(source: &Arc<SourceConfig>) -> BTreeSet<PathBuf> {
    let scanned = Arc::clone(source);
    match tokio::task::spawn_blocking(move || source::resolve(&scanned)).await {
        Ok(Ok(paths)) => paths,
        Ok(Err(e)) => {
            warn!(source = %source.name, error = %e, "source discovery failed");
            BTreeSet::new()
        }
        Err(e) => {
            warn!(source = %source.name, error = %e, "source discovery task failed");
            BTreeSet::new()
        }
    }
}

/// Periodically re-resolve a source that initially matched nothing.
async fn rescan(manager: TailManager, source: Arc<SourceConfig>) {
    let cancel = manager.inner.cancel.clone();
    let mut ticker = tokio::time::interval(manager.inner.options.rescan_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let paths = resolve_logged(&source).await;
                let started = manager.follow_paths(&source, &paths).await;
                if started > 0 {
                    info!(source = %source.name, started, "rescan found new files");
                }
            }
        }
    }
}

/// Copy every routed entry into the history buffer.
async fn drain_into_buffer(
    mut receiver: broadcast::Receiver<Entry>,
    buffer: Arc<HistoryBuffer>,
    skipped: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = receiver.recv() => match next {
                Ok(entry) => buffer.append(entry),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    skipped.fetch_add(missed, Ordering::Relaxed);
                    warn!(missed, "buffer drain lagged behind the router; entries skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("buffer drain stopped");
}
