use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use log::debug;

use crate::cancel::CancelToken;
use crate::error::panic_message;
use crate::{ParError, Result};

/// A completed slot: its index and either the value or a panic payload.
type Completion<R> = (usize, thread::Result<R>);

/// Per-call barrier gathering index-addressed results from many producers.
///
/// Producers obtain a [`SlotWriter`] via [`writer`](Self::writer) and fill
/// disjoint slots from any thread. The single consumer calls
/// [`wait`](Self::wait), which blocks until every slot is filled and returns
/// the values in slot order, independent of completion order.
pub struct ResultCollector<R> {
    expected: usize,
    tx: Sender<Completion<R>>,
    rx: Receiver<Completion<R>>,
    abandoned: Arc<AtomicBool>,
}

/// Producer handle for a [`ResultCollector`].
pub struct SlotWriter<R> {
    expected: usize,
    tx: Sender<Completion<R>>,
    abandoned: Arc<AtomicBool>,
}

impl<R> Clone for SlotWriter<R> {
    fn clone(&self) -> Self {
        SlotWriter {
            expected: self.expected,
            tx: self.tx.clone(),
            abandoned: Arc::clone(&self.abandoned),
        }
    }
}

impl<R> ResultCollector<R> {
    /// Creates a collector expecting `expected` slots.
    pub fn new(expected: usize) -> Self {
        let (tx, rx) = channel::unbounded();
        ResultCollector {
            expected,
            tx,
            rx,
            abandoned: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of slots this collector waits for.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Returns a new producer handle.
    pub fn writer(&self) -> SlotWriter<R> {
        SlotWriter {
            expected: self.expected,
            tx: self.tx.clone(),
            abandoned: Arc::clone(&self.abandoned),
        }
    }

    /// Marks the call abandoned: producers that have not started skip their work.
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }

    /// Blocks until every slot is filled and returns the slots in order.
    pub fn wait(self) -> Result<Vec<R>> {
        self.wait_or_cancel(&CancelToken::new())
    }

    /// Like [`wait`](Self::wait), but gives up with
    /// [`ParError::Cancelled`] once `cancel` fires.
    ///
    /// Fails with [`ParError::TaskPanicked`] on the first faulted slot, and
    /// with [`ParError::Cancelled`] if every producer is dropped before all
    /// slots are filled. On any failure the call is abandoned.
    pub fn wait_or_cancel(self, cancel: &CancelToken) -> Result<Vec<R>> {
        self.wait_with_leftovers(cancel).0
    }

    /// Like [`wait_or_cancel`](Self::wait_or_cancel), and also hands back
    /// the completions that arrive after the consumer stopped listening.
    pub(crate) fn wait_with_leftovers(
        self,
        cancel: &CancelToken,
    ) -> (Result<Vec<R>>, Leftovers<R>) {
        let ResultCollector {
            expected,
            tx,
            rx,
            abandoned,
        } = self;
        // Only producers may keep the channel alive from here on.
        drop(tx);

        let mut slots: Vec<Option<R>> = (0..expected).map(|_| None).collect();
        let mut filled = 0;

        while filled < expected {
            let completion = select! {
                recv(rx) -> msg => msg,
                recv(cancel.signal()) -> _ => {
                    abandoned.store(true, Ordering::SeqCst);
                    debug!("Collector cancelled with {filled}/{expected} slots filled");
                    return (Err(ParError::cancelled()), Leftovers { rx });
                }
            };

            match completion {
                Ok((index, Ok(value))) => {
                    let slot = &mut slots[index];
                    if slot.is_none() {
                        *slot = Some(value);
                        filled += 1;
                    }
                }
                Ok((index, Err(payload))) => {
                    abandoned.store(true, Ordering::SeqCst);
                    let err = ParError::TaskPanicked {
                        index,
                        message: panic_message(&*payload),
                    };
                    return (Err(err), Leftovers { rx });
                }
                Err(_) => {
                    abandoned.store(true, Ordering::SeqCst);
                    debug!("All producers gone with {filled}/{expected} slots filled");
                    return (Err(ParError::cancelled()), Leftovers { rx });
                }
            }
        }

        (
            Ok(slots.into_iter().flatten().collect()),
            Leftovers { rx },
        )
    }

    /// Gives up on the call without waiting.
    pub(crate) fn into_leftovers(self) -> Leftovers<R> {
        self.abandon();
        Leftovers { rx: self.rx }
    }
}

/// Completions still queued after the consumer of a [`ResultCollector`]
/// has returned.
pub(crate) struct Leftovers<R> {
    rx: Receiver<Completion<R>>,
}

impl<R> Leftovers<R> {
    /// Panic messages of the faulted slots queued so far.
    pub(crate) fn faults(self) -> Vec<String> {
        self.rx
            .try_iter()
            .filter_map(|(index, outcome)| {
                outcome
                    .err()
                    .map(|payload| format!("task {index}: {}", panic_message(&*payload)))
            })
            .collect()
    }
}

impl<R> SlotWriter<R> {
    /// Writes `value` into slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than the collector's expected count.
    pub fn set(&self, index: usize, value: R) {
        self.complete(index, Ok(value));
    }

    /// Computes slot `index` with `f`, capturing a panic as a slot fault.
    ///
    /// Does nothing if the call has already been abandoned.
    pub fn run<F>(&self, index: usize, f: F)
    where
        F: FnOnce() -> R,
    {
        if self.is_abandoned() {
            debug!("Skipping slot {index} of abandoned call");
            return;
        }
        self.complete(index, panic::catch_unwind(AssertUnwindSafe(f)));
    }

    /// Returns `true` if the consumer has given up on this call.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn complete(&self, index: usize, outcome: thread::Result<R>) {
        assert!(
            index < self.expected,
            "slot index {index} out of range for {} slots",
            self.expected
        );
        // The consumer may already have returned; the value is then dropped.
        let _ = self.tx.send((index, outcome));
    }
}
