use std::cmp::Ordering;
use std::fmt::Display;
use std::ops::Range;
use std::sync::Arc;
use std::thread;

use log::{debug, error};

use crate::cancel::CancelToken;
use crate::collector::ResultCollector;
use crate::error::panic_message;
use crate::monoid::Monoid;
use crate::partition;
use crate::thread_pool::{SharedQueueThreadPool, ThreadPool};
use crate::{ParError, Result};

/// Runs list operations in parallel over contiguous slices of the input.
///
/// Every operation splits the input with [`partition::split`], computes a
/// local aggregate per slice, then combines the slice aggregates in slice
/// order. Results therefore never depend on which slice finishes first.
///
/// With a pool (see [`with_pool`](Reducer::with_pool)) slices are handed to
/// the pool's [`map`](ThreadPool::map). Without one, each call spawns one
/// thread per slice and joins all of them before returning.
pub struct Reducer<P = SharedQueueThreadPool> {
    pool: Option<Arc<P>>,
    cancel: CancelToken,
}

impl Reducer<SharedQueueThreadPool> {
    /// Creates a reducer that spawns a fresh thread per slice.
    pub fn new() -> Self {
        Reducer {
            pool: None,
            cancel: CancelToken::new(),
        }
    }
}

impl Default for Reducer<SharedQueueThreadPool> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ThreadPool> Reducer<P> {
    /// Creates a reducer that dispatches slices to a shared pool.
    pub fn with_pool(pool: Arc<P>) -> Self {
        Reducer {
            pool: Some(pool),
            cancel: CancelToken::new(),
        }
    }

    /// Uses `cancel` to abort waiting calls.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The token this reducer's calls observe.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns the greatest element according to `comparator`.
    ///
    /// Among equal greatest elements the first one wins.
    ///
    /// # Errors
    ///
    /// [`ParError::EmptyInput`] if `values` is empty.
    pub fn maximum<T, C>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        comparator: C,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        let values = values.into();
        let slices = partition::split(values.len(), threads)?;
        if values.is_empty() {
            return Err(ParError::EmptyInput);
        }

        let comparator = Arc::new(comparator);
        let local = Arc::clone(&comparator);
        let maxima = self.run_slices(values, slices, move |slice: &[T]| {
            first_extreme(slice.iter(), &*local, Ordering::Greater).cloned()
        })?;
        let maxima: Vec<T> = maxima.into_iter().flatten().collect();
        first_extreme(maxima.iter(), &*comparator, Ordering::Greater)
            .cloned()
            .ok_or(ParError::EmptyInput)
    }

    /// Returns the least element according to `comparator`.
    ///
    /// Among equal least elements the first one wins.
    ///
    /// # Errors
    ///
    /// [`ParError::EmptyInput`] if `values` is empty.
    pub fn minimum<T, C>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        comparator: C,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        let values = values.into();
        let slices = partition::split(values.len(), threads)?;
        if values.is_empty() {
            return Err(ParError::EmptyInput);
        }

        let comparator = Arc::new(comparator);
        let local = Arc::clone(&comparator);
        let minima = self.run_slices(values, slices, move |slice: &[T]| {
            first_extreme(slice.iter(), &*local, Ordering::Less).cloned()
        })?;
        let minima: Vec<T> = minima.into_iter().flatten().collect();
        first_extreme(minima.iter(), &*comparator, Ordering::Less)
            .cloned()
            .ok_or(ParError::EmptyInput)
    }

    /// Returns whether every element satisfies `predicate`. True for empty input.
    pub fn all<T, F>(&self, threads: usize, values: impl Into<Arc<[T]>>, predicate: F) -> Result<bool>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let values = values.into();
        let slices = partition::split(values.len(), threads)?;
        let partial = self.run_slices(values, slices, move |slice: &[T]| {
            slice.iter().all(|item| predicate(item))
        })?;
        Ok(partial.into_iter().all(|ok| ok))
    }

    /// Returns whether some element satisfies `predicate`. False for empty input.
    pub fn any<T, F>(&self, threads: usize, values: impl Into<Arc<[T]>>, predicate: F) -> Result<bool>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let values = values.into();
        let slices = partition::split(values.len(), threads)?;
        let partial = self.run_slices(values, slices, move |slice: &[T]| {
            slice.iter().any(|item| predicate(item))
        })?;
        Ok(partial.into_iter().any(|found| found))
    }

    /// Concatenates the `Display` form of every element, without separator.
    pub fn join<T>(&self, threads: usize, values: impl Into<Arc<[T]>>) -> Result<String>
    where
        T: Display + Send + Sync + 'static,
    {
        let values = values.into();
        let slices = partition::split(values.len(), threads)?;
        let parts = self.run_slices(values, slices, |slice: &[T]| {
            slice.iter().map(ToString::to_string).collect::<String>()
        })?;
        Ok(parts.concat())
    }

    /// Keeps the elements satisfying `predicate`, in input order.
    pub fn filter<T, F>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        predicate: F,
    ) -> Result<Vec<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let values = values.into();
        let slices = partition::split(values.len(), threads)?;
        let parts = self.run_slices(values, slices, move |slice: &[T]| {
            slice
                .iter()
                .filter(|&item| predicate(item))
                .cloned()
                .collect::<Vec<T>>()
        })?;
        Ok(parts.into_iter().flatten().collect())
    }

    /// Applies `f` to every element, in input order.
    pub fn map<T, U, F>(&self, threads: usize, values: impl Into<Arc<[T]>>, f: F) -> Result<Vec<U>>
    where
        T: Send + Sync + 'static,
        U: Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let values = values.into();
        let slices = partition::split(values.len(), threads)?;
        let parts = self.run_slices(values, slices, move |slice: &[T]| {
            slice.iter().map(|item| f(item)).collect::<Vec<U>>()
        })?;
        Ok(parts.into_iter().flatten().collect())
    }

    /// Folds all elements with `monoid`. Returns the identity for empty input.
    pub fn reduce<T, F>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        monoid: Monoid<T, F>,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T, T) -> T + Send + Sync + 'static,
    {
        self.map_reduce(threads, values, T::clone, monoid)
    }

    /// Lifts every element with `lift`, then folds the results with `monoid`.
    pub fn map_reduce<T, R, L, F>(
        &self,
        threads: usize,
        values: impl Into<Arc<[T]>>,
        lift: L,
        monoid: Monoid<R, F>,
    ) -> Result<R>
    where
        T: Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        L: Fn(&T) -> R + Send + Sync + 'static,
        F: Fn(R, R) -> R + Send + Sync + 'static,
    {
        let values = values.into();
        let slices = partition::split(values.len(), threads)?;
        let monoid = Arc::new(monoid);
        let local = Arc::clone(&monoid);
        let parts = self.run_slices(values, slices, move |slice: &[T]| {
            local.fold(slice.iter().map(|item| lift(item)))
        })?;
        Ok(monoid.fold(parts))
    }

    /// Computes `aggregate` for every slice and returns the results in slice order.
    fn run_slices<T, A, M>(
        &self,
        values: Arc<[T]>,
        slices: Vec<Range<usize>>,
        aggregate: M,
    ) -> Result<Vec<A>>
    where
        T: Send + Sync + 'static,
        A: Send + 'static,
        M: Fn(&[T]) -> A + Send + Sync + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(ParError::cancelled());
        }
        if slices.is_empty() {
            return Ok(Vec::new());
        }

        match &self.pool {
            Some(pool) => {
                debug!("Dispatching {} slices to pool", slices.len());
                pool.map_with(
                    move |range: Range<usize>| aggregate(&values[range]),
                    slices,
                    &self.cancel,
                )
            }
            None => self.run_ephemeral(values, slices, aggregate),
        }
    }

    /// Runs one named thread per slice; every spawned thread is joined
    /// before this returns, whatever the outcome.
    fn run_ephemeral<T, A, M>(
        &self,
        values: Arc<[T]>,
        slices: Vec<Range<usize>>,
        aggregate: M,
    ) -> Result<Vec<A>>
    where
        T: Send + Sync + 'static,
        A: Send + 'static,
        M: Fn(&[T]) -> A + Send + Sync + 'static,
    {
        debug!("Spawning {} slice threads", slices.len());
        let aggregate = Arc::new(aggregate);
        let collector = ResultCollector::new(slices.len());
        let mut handles = Vec::with_capacity(slices.len());
        let mut spawn_error = None;

        for (index, range) in slices.into_iter().enumerate() {
            let writer = collector.writer();
            let values = Arc::clone(&values);
            let aggregate = Arc::clone(&aggregate);
            let spawned = thread::Builder::new()
                .name(format!("slice-worker-{index}"))
                .spawn(move || writer.run(index, move || (*aggregate)(&values[range])));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            }
        }

        let (outcome, leftovers) = match spawn_error {
            Some(e) => {
                collector.abandon();
                (Err(ParError::Io(e)), collector.into_leftovers())
            }
            None => collector.wait_with_leftovers(&self.cancel),
        };

        let mut suppressed = Vec::new();
        for handle in handles {
            if let Err(payload) = handle.join() {
                suppressed.push(panic_message(&*payload));
            }
        }

        match outcome {
            Err(ParError::Cancelled { suppressed: mut earlier }) => {
                // Every slice thread is joined, so all late faults are queued.
                earlier.extend(suppressed);
                earlier.extend(leftovers.faults());
                Err(ParError::Cancelled {
                    suppressed: earlier,
                })
            }
            outcome => {
                for message in &suppressed {
                    error!("Slice thread terminated abnormally: {message}");
                }
                outcome
            }
        }
    }
}

/// Returns the first item that no later item beats in direction `want`.
///
/// An item replaces the current best only when it compares strictly
/// `want` against it, so the earliest of equal extremes is kept.
fn first_extreme<'a, T, C>(
    items: impl Iterator<Item = &'a T>,
    comparator: &C,
    want: Ordering,
) -> Option<&'a T>
where
    T: 'a,
    C: Fn(&T, &T) -> Ordering + ?Sized,
{
    items.fold(None, |best, item| match best {
        Some(best) if comparator(item, best) != want => Some(best),
        _ => Some(item),
    })
}
