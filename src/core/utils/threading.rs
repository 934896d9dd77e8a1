//! Bulk-synchronous parallel range loops over the rayon worker pool.
//!
//! Every parallel region in the trainer is a fork-join over contiguous row
//! or feature blocks; nothing here suspends or runs in the background.

use crate::core::constants::K_MIN_BLOCK_SIZE;
use crate::core::error::{BoostError, Result};
use crate::core::types::DataSize;
use crate::core::utils::common::block_info;
use rayon::prelude::*;

/// Sizes the global rayon pool. `num_threads <= 0` keeps the default.
/// Safe to call more than once; later calls are ignored by rayon.
pub fn init_pool(num_threads: i32) -> Result<()> {
    if num_threads <= 0 {
        return Ok(());
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads as usize)
        .build_global()
    {
        Ok(()) => Ok(()),
        // The global pool can only be built once per process; a second
        // configuration attempt with the same intent is not an error.
        Err(_) => Ok(()),
    }
}

/// Number of workers in the current pool.
pub fn num_threads() -> usize {
    rayon::current_num_threads()
}

/// Runs `f(block_idx, start, end)` over contiguous blocks of `[0, total)`
/// in parallel. Blocks are at least [`K_MIN_BLOCK_SIZE`] rows so small
/// inputs stay on one worker.
pub fn for_loop_blocks<F>(total: DataSize, f: F)
where
    F: Fn(usize, DataSize, DataSize) + Sync,
{
    if total <= 0 {
        return;
    }
    let (num_blocks, block_size) = block_info(total, num_threads(), K_MIN_BLOCK_SIZE);
    (0..num_blocks).into_par_iter().for_each(|i| {
        let start = i as DataSize * block_size;
        let end = (start + block_size).min(total);
        if start < end {
            f(i, start, end);
        }
    });
}

/// Parallel sum reduction of `f(row)` over `[0, total)`.
///
/// Block boundaries are fixed and the block results are folded serially,
/// so the result is reproducible at any thread count despite float
/// non-associativity.
pub fn sum_over<F>(total: DataSize, f: F) -> f64
where
    F: Fn(DataSize) -> f64 + Sync,
{
    if total <= 0 {
        return 0.0;
    }
    let (num_blocks, block_size) = block_info(total, num_threads(), K_MIN_BLOCK_SIZE);
    let block_sums: Vec<f64> = (0..num_blocks)
        .into_par_iter()
        .map(|i| {
            let start = i as DataSize * block_size;
            let end = (start + block_size).min(total);
            let mut acc = 0.0;
            for row in start..end {
                acc += f(row);
            }
            acc
        })
        .collect();
    block_sums.iter().sum()
}

/// Checks that a buffer length matches the expected row count; shared by
/// the metadata setters.
pub fn check_len(actual: usize, expected: DataSize, what: &str) -> Result<()> {
    if actual != expected as usize {
        return Err(BoostError::dataset(format!(
            "{} size {} does not match row count {}",
            what, actual, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn blocks_cover_every_row_once() {
        let total = 10_000;
        let sum = AtomicI64::new(0);
        for_loop_blocks(total, |_, start, end| {
            let mut local = 0i64;
            for row in start..end {
                local += row as i64;
            }
            sum.fetch_add(local, Ordering::Relaxed);
        });
        let expect = (total as i64 - 1) * total as i64 / 2;
        assert_eq!(sum.load(Ordering::Relaxed), expect);
    }

    #[test]
    fn sum_over_matches_serial() {
        let total = 5000;
        let parallel = sum_over(total, |row| row as f64);
        let serial: f64 = (0..total).map(|r| r as f64).sum();
        assert_eq!(parallel, serial);
    }
}
