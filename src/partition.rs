use std::ops::Range;

use crate::{ParError, Result};

/// Splits `0..n_items` into contiguous, size-balanced slices.
///
/// Produces `min(threads, n_items)` non-empty ranges in order; the first
/// `n_items % count` ranges hold one extra item. An empty input yields no
/// slices.
///
/// # Errors
///
/// Returns [`ParError::InvalidThreadCount`] if `threads` is zero.
pub fn split(n_items: usize, threads: usize) -> Result<Vec<Range<usize>>> {
    if threads == 0 {
        return Err(ParError::InvalidThreadCount(threads));
    }
    let count = threads.min(n_items);
    if count == 0 {
        return Ok(Vec::new());
    }

    let base = n_items / count;
    let remainder = n_items % count;
    let mut slices = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let len = if i < remainder { base + 1 } else { base };
        slices.push(start..start + len);
        start += len;
    }
    Ok(slices)
}
