//! Live entry stream handed out by [`TailManager::subscribe`](crate::TailManager::subscribe).

use crate::entry::Entry;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

/// Entries routed after the moment of subscription, until shutdown.
///
/// A subscriber that falls more than the router capacity behind skips the
/// entries it missed rather than stalling ingestion.
pub struct EntryStream {
    inner: BroadcastStream<Entry>,
    skipped: u64,
}

impl EntryStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Entry>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            skipped: 0,
        }
    }

    /// Number of entries this subscriber has missed by lagging.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Stream for EntryStream {
    type Item = Entry;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(entry))) => return Poll::Ready(Some(entry)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    self.skipped += missed;
                    warn!(missed, "live subscriber lagged behind the router; skipping entries");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
