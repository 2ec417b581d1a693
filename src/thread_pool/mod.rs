use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::collector::ResultCollector;
use crate::{ParError, Result};

/// A pool of persistent threads executing jobs concurrently.
///
/// Implementors manage a fixed set of worker threads fed from a shared
/// queue. The provided [`map`](ThreadPool::map) builds an order-preserving
/// parallel map on top of [`spawn`](ThreadPool::spawn).
pub trait ThreadPool: Send + Sync + 'static {
    /// Creates a new thread pool with the given number of threads.
    ///
    /// # Errors
    ///
    /// Returns [`ParError::InvalidThreadCount`] if `threads` is zero, or an
    /// error if a worker thread cannot be started.
    fn new(threads: usize) -> Result<Self>
    where
        Self: Sized;

    /// Queues a job to be executed by one of the threads in the pool.
    ///
    /// # Errors
    ///
    /// Returns [`ParError::PoolClosed`] once the pool has been closed.
    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static;

    /// Shuts the pool down. Jobs already queued still run.
    ///
    /// Further calls to `spawn` or `map` fail with [`ParError::PoolClosed`].
    fn close(&self);

    /// Returns `true` once the pool has been closed.
    fn is_closed(&self) -> bool;

    /// Applies `f` to every input on the pool, returning results in input order.
    ///
    /// Blocks until every result is available.
    fn map<T, R, F>(&self, f: F, inputs: Vec<T>) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        self.map_with(f, inputs, &CancelToken::new())
    }

    /// Like [`map`](ThreadPool::map), but stops waiting once `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`ParError::PoolClosed`] if the pool was closed before the call.
    /// - [`ParError::Cancelled`] if `cancel` fires or the pool closes while
    ///   the call is queueing its tasks.
    /// - [`ParError::TaskPanicked`] if `f` panics for some input.
    fn map_with<T, R, F>(&self, f: F, inputs: Vec<T>, cancel: &CancelToken) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        if self.is_closed() {
            return Err(ParError::PoolClosed);
        }
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let f = Arc::new(f);
        let collector = ResultCollector::new(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let writer = collector.writer();
            let f = Arc::clone(&f);
            if let Err(e) = self.spawn(move || writer.run(index, move || (*f)(input))) {
                collector.abandon();
                return Err(match e {
                    ParError::PoolClosed if index > 0 => ParError::cancelled(),
                    e => e,
                });
            }
        }
        collector.wait_or_cancel(cancel)
    }
}

mod rayon_pool;
mod shared_queue;

pub use self::rayon_pool::RayonThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;
