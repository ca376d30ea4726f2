//! Fork-join helpers over independent work units.
//!
//! Every unit is identified by its index and owns whatever state it needs;
//! results are gathered only after all units finish.  On wasm32 the same
//! calls run sequentially.

use std::ops::Range;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

/// Evaluates `work` for every index in `range` and collects the results.
///
/// The result order follows the index order regardless of completion order.
pub(crate) fn map_collect<R, F>(range: Range<u64>, work: F) -> Vec<R>
where
    R: Send,
    F: Fn(u64) -> R + Send + Sync,
{
    #[cfg(not(target_arch = "wasm32"))]
    {
        range.into_par_iter().map(work).collect()
    }
    #[cfg(target_arch = "wasm32")]
    {
        range.map(work).collect()
    }
}

/// Counts the indices in `range` for which `work` holds.
///
/// Integer counts add up the same way under any split of the range.
pub(crate) fn map_count<F>(range: Range<u64>, work: F) -> u64
where
    F: Fn(u64) -> bool + Send + Sync,
{
    #[cfg(not(target_arch = "wasm32"))]
    {
        range.into_par_iter().filter(|&index| work(index)).count() as u64
    }
    #[cfg(target_arch = "wasm32")]
    {
        range.filter(|&index| work(index)).count() as u64
    }
}

/// Worker threads available to the pool.
pub fn worker_count() -> usize {
    #[cfg(not(target_arch = "wasm32"))]
    {
        rayon::current_num_threads()
    }
    #[cfg(target_arch = "wasm32")]
    {
        1
    }
}
