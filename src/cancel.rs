use std::sync::{Arc, Mutex};

use crossbeam::channel::{self, Receiver, Sender};

/// A cooperative cancellation signal shared between threads.
///
/// Cloning is cheap; every clone observes the same signal. The signal
/// is a channel that is never written to: cancelling drops its only
/// sender, which wakes every receiver blocked in a `select!`.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        CancelToken {
            inner: Arc::new(Inner {
                trigger: Mutex::new(Some(tx)),
                signal: rx,
            }),
        }
    }

    /// Cancels the token. Calling this more than once has no effect.
    pub fn cancel(&self) {
        self.inner.trigger.lock().unwrap().take();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.trigger.lock().unwrap().is_none()
    }

    /// Receiver that becomes ready (disconnected) on cancellation.
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
