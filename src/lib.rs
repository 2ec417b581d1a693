#![deny(missing_docs)]

//! Parallel list operations over a bounded worker pool.
//!
//! This library splits a sequence into balanced contiguous slices,
//! aggregates every slice on its own thread, and combines the slice
//! results in their original order. Slices run either on a persistent
//! shared-queue pool or on threads spawned for a single call.

mod cancel;
mod collector;
mod error;
/// Monoids for parallel reductions.
pub mod monoid;
/// Balanced splitting of a sequence into slices.
pub mod partition;
mod reducer;
/// Thread pool implementations for executing slice tasks.
pub mod thread_pool;

pub use cancel::CancelToken;
pub use collector::{ResultCollector, SlotWriter};
pub use error::{ParError, Result};
pub use monoid::Monoid;
pub use reducer::Reducer;
pub use thread_pool::{RayonThreadPool, SharedQueueThreadPool, ThreadPool};
