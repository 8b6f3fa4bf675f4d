// ── Poll event streams ──
//
// Broadcast-backed alternative to registering an observer: each stream
// receives every poll outcome published after it was created.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::coordinator::PollEvent;

/// Every [`PollEvent`] published after subscription, failures included.
///
/// A consumer that falls behind the coordinator's buffer skips the
/// oldest events and resumes with the newest ones; the gap is logged.
/// The stream ends when the coordinator is dropped.
pub struct PollEventStream {
    inner: BroadcastStream<PollEvent>,
    skipped: u64,
}

impl PollEventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<PollEvent>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            skipped: 0,
        }
    }

    /// Events lost so far to lagging.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Stream for PollEventStream {
    type Item = PollEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                Some(Ok(event)) => return Poll::Ready(Some(event)),
                Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                    warn!(missed, "poll event stream lagged");
                    self.skipped += missed;
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
