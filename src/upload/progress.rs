//! Progress accounting for request bodies.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use pin_project_lite::pin_project;

use super::executor::{TransferEvent, TransferListener};

/// Computes `round(100 * loaded / total)`, clamped to 100.
#[must_use]
pub fn percent_of(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let loaded = u128::from(loaded.min(total));
    let total = u128::from(total);
    let percent = (200 * loaded + total) / (2 * total);
    u8::try_from(percent).unwrap_or(100)
}

/// Reports transfer progress to a listener.
///
/// Handed to the transport for one attempt. Clones share state.
#[derive(Clone)]
pub struct ProgressReporter {
    listener: Arc<dyn TransferListener>,
    completed: Arc<AtomicBool>,
}

impl ProgressReporter {
    pub(crate) fn new(listener: Arc<dyn TransferListener>) -> Self {
        Self {
            listener,
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reports `loaded` bytes sent. Without a computable `total`, progress
    /// resets to zero until completion.
    pub fn report(&self, loaded: u64, total: Option<u64>) {
        let (percent, sent_bytes) = match total {
            Some(total) if total > 0 => (percent_of(loaded, total), loaded.min(total)),
            _ => (0, 0),
        };
        self.completed.store(percent == 100, Ordering::SeqCst);
        self.listener.notify(TransferEvent::Progress {
            percent,
            sent_bytes,
        });
    }

    /// Reports full progress unless it was already the last reported value.
    pub fn complete(&self, size: u64) {
        if !self.completed.swap(true, Ordering::SeqCst) {
            self.listener.notify(TransferEvent::Progress {
                percent: 100,
                sent_bytes: size,
            });
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("completed", &self.completed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

pin_project! {
    /// Body stream that reports how many bytes have been handed to the transport.
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        reporter: ProgressReporter,
        sent: Arc<AtomicU64>,
        total: u64,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, reporter: ProgressReporter, total: u64) -> Self {
        Self {
            inner,
            reporter,
            sent: Arc::new(AtomicU64::new(0)),
            total,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    let sent = this.sent.fetch_add(chunk.len() as u64, Ordering::Relaxed)
                        + chunk.len() as u64;
                    this.reporter.report(sent, Some(*this.total));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
