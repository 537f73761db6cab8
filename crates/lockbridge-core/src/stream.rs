// ── Event delivery ──
//
// Exactly one listener at a time. `emit` is synchronous and callable from
// any thread; the listener drains an unbounded FIFO on its own task, so
// events arrive in emission order.

use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace};

use crate::event::BridgeEvent;

type Listener = mpsc::UnboundedSender<BridgeEvent>;

/// Single-consumer event sink shared by all orchestrators.
#[derive(Debug, Default)]
pub struct EventStream {
    listener: Mutex<Option<Listener>>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn listener(&self) -> MutexGuard<'_, Option<Listener>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a new listener, closing the previous one.
    pub fn attach(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.listener().replace(tx).is_some() {
            debug!("replaced event listener");
        }
        EventReceiver { rx }
    }

    pub fn detach(&self) {
        if self.listener().take().is_some() {
            debug!("event listener detached");
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver `event` to the current listener. Without one this is a no-op;
    /// nothing is buffered for a later listener.
    pub fn emit(&self, event: BridgeEvent) {
        let mut listener = self.listener();
        let Some(tx) = listener.as_ref() else {
            trace!(?event, "no listener, dropping event");
            return;
        };
        if tx.send(event).is_err() {
            debug!("event listener went away");
            *listener = None;
        }
    }
}

// ── EventReceiver ───────────────────────────────────────────────────

/// Listener end of an [`EventStream`].
///
/// Yields `None` once a newer listener replaces this one or the stream is
/// detached.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<BridgeEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Option<BridgeEvent> {
        self.rx.recv().await
    }

    /// Next already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<BridgeEvent> {
        self.rx.try_recv().ok()
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> EventReceiverStream {
        EventReceiverStream {
            inner: UnboundedReceiverStream::new(self.rx),
        }
    }
}

/// `Stream` adapter over an [`EventReceiver`].
#[derive(Debug)]
pub struct EventReceiverStream {
    inner: UnboundedReceiverStream<BridgeEvent>,
}

impl Stream for EventReceiverStream {
    type Item = BridgeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
