//! Entry Router: the bounded ingress every follower feeds, plus fan-out.
//!
//! ```text
//! Follower ─┐
//! Follower ─┼─► Outbox (per source) ─► ingress mpsc ─► dispatcher ─► broadcast ─┬─► buffer drain
//! Follower ─┘      │                                                            └─► subscribe()
//!                  └─ overflow queue (bounded, drop-oldest)
//! ```
//!
//! Producers never block: when the ingress is full, entries wait in their
//! source's overflow queue and are flushed ahead of newer lines on the next
//! emit or poll.

use crate::entry::Entry;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-source sequencing and overflow state shared by all of the source's followers.
#[derive(Debug)]
pub(crate) struct Outbox {
    source: String,
    tags: Vec<String>,
    ingress: mpsc::Sender<Entry>,
    capacity: usize,
    state: Mutex<OutboxState>,
    dropped_total: Arc<AtomicU64>,
}

#[derive(Debug, Default)]
struct OutboxState {
    last_sequence: u64,
    pending: VecDeque<Entry>,
    dropped: u64,
}

impl Outbox {
    pub(crate) fn new(
        source: impl Into<String>,
        tags: Vec<String>,
        ingress: mpsc::Sender<Entry>,
        capacity: usize,
        dropped_total: Arc<AtomicU64>,
    ) -> Self {
        Self {
            source: source.into(),
            tags,
            ingress,
            capacity: capacity.max(1),
            state: Mutex::new(OutboxState::default()),
            dropped_total,
        }
    }

    /// Turn lines into entries and hand them to the router.
    ///
    /// Sequence allocation and enqueueing happen under one lock, so entries of
    /// this source reach the ingress in sequence order. Fails with `Closed`
    /// once the router has gone away.
    pub(crate) fn emit(&self, lines: Vec<String>) -> Result<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)?;

        for content in lines {
            state.last_sequence += 1;
            let entry = Entry::new(
                self.source.as_str(),
                content,
                self.tags.clone(),
                state.last_sequence,
            );

            if !state.pending.is_empty() {
                self.enqueue_overflow(&mut state, entry);
                continue;
            }

            match self.ingress.try_send(entry) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(entry)) => {
                    self.enqueue_overflow(&mut state, entry)
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(Error::Closed),
            }
        }

        Ok(())
    }

    /// Push as much of the overflow queue into the ingress as it will take.
    pub(crate) fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut OutboxState) -> Result<()> {
        while let Some(entry) = state.pending.pop_front() {
            match self.ingress.try_send(entry) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(entry)) => {
                    state.pending.push_front(entry);
                    break;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(Error::Closed),
            }
        }
        Ok(())
    }

    fn enqueue_overflow(&self, state: &mut OutboxState, entry: Entry) {
        state.pending.push_back(entry);
        if state.pending.len() > self.capacity {
            if let Some(oldest) = state.pending.pop_front() {
                state.dropped += 1;
                self.dropped_total.fetch_add(1, Ordering::Relaxed);
                warn!(
                    source = %self.source,
                    sequence = oldest.sequence,
                    dropped = state.dropped,
                    "router full and overflow queue at capacity; dropping oldest pending entry"
                );
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    #[cfg(test)]
    pub(crate) fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}

/// Move entries from the ingress queue onto the broadcast fan-out until
/// cancelled or every producer is gone.
pub(crate) async fn dispatch(
    mut ingress: mpsc::Receiver<Entry>,
    live: broadcast::Sender<Entry>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = ingress.recv() => match next {
                // No receivers only means nobody is listening right now.
                Some(entry) => { let _ = live.send(entry); }
                None => break,
            },
        }
    }
    debug!("entry router dispatcher stopped");
}
