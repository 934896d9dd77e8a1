//! Leaf-grouped view over a sparse column.
//!
//! Keeping a leaf's non-default entries contiguous makes histogram
//! construction a sequential scan. The price is a re-partition of the
//! affected block after every split, which is why only sparse columns
//! get one of these.

use crate::core::types::{BinIndex, DataSize, Hist, Score};
use crate::io::bin::HistogramBinEntry;

/// Interface for leaf-ordered bin data.
pub trait OrderedBin: Send + Sync {
    /// Rebuilds the leaf blocks for a new tree: everything lands in leaf
    /// 0, restricted to rows whose `used_flags` byte is set when bagging.
    fn init(&mut self, used_flags: Option<&[u8]>, num_leaves: i32);

    /// Accumulates the histogram of one leaf. `gradients`/`hessians` are
    /// indexed by row. The default bin is never stored here; the caller
    /// reconstructs it from the leaf totals.
    fn construct_histogram(
        &self,
        leaf: i32,
        gradients: &[Score],
        hessians: &[Score],
        out: &mut [HistogramBinEntry],
    );

    /// Partitions the leaf's block in place; rows flagged in
    /// `left_flags` stay with `leaf`, the rest become `right_leaf`.
    fn split(&mut self, leaf: i32, right_leaf: i32, left_flags: &[u8]);
}

/// One stored entry: row index plus its bin.
#[derive(Debug, Clone, Copy)]
struct SparsePair {
    ridx: DataSize,
    bin: BinIndex,
}

/// Ordered view over one sparse column.
pub struct OrderedSparseBin {
    /// All non-default pairs in row order; the template `init` restores
    /// from.
    template: Vec<(DataSize, BinIndex)>,
    /// Pairs grouped by leaf, `num_used` of them valid.
    ordered_pairs: Vec<SparsePair>,
    num_used: usize,
    leaf_start: Vec<DataSize>,
    leaf_cnt: Vec<DataSize>,
    #[allow(dead_code)]
    num_data: DataSize,
}

impl OrderedSparseBin {
    pub fn new(pairs: Vec<(DataSize, BinIndex)>, num_data: DataSize) -> Self {
        let ordered_pairs = pairs
            .iter()
            .map(|&(ridx, bin)| SparsePair { ridx, bin })
            .collect::<Vec<_>>();
        let num_used = ordered_pairs.len();
        OrderedSparseBin {
            template: pairs,
            ordered_pairs,
            num_used,
            leaf_start: Vec::new(),
            leaf_cnt: Vec::new(),
            num_data,
        }
    }
}

impl OrderedBin for OrderedSparseBin {
    fn init(&mut self, used_flags: Option<&[u8]>, num_leaves: i32) {
        self.leaf_start = vec![0; num_leaves as usize];
        self.leaf_cnt = vec![0; num_leaves as usize];
        match used_flags {
            None => {
                for (j, &(ridx, bin)) in self.template.iter().enumerate() {
                    self.ordered_pairs[j] = SparsePair { ridx, bin };
                }
                self.num_used = self.template.len();
            }
            Some(flags) => {
                let mut j = 0usize;
                for &(ridx, bin) in &self.template {
                    if flags[ridx as usize] != 0 {
                        self.ordered_pairs[j] = SparsePair { ridx, bin };
                        j += 1;
                    }
                }
                self.num_used = j;
            }
        }
        if !self.leaf_cnt.is_empty() {
            self.leaf_cnt[0] = self.num_used as DataSize;
        }
    }

    fn construct_histogram(
        &self,
        leaf: i32,
        gradients: &[Score],
        hessians: &[Score],
        out: &mut [HistogramBinEntry],
    ) {
        let start = self.leaf_start[leaf as usize] as usize;
        let end = start + self.leaf_cnt[leaf as usize] as usize;
        for pair in &self.ordered_pairs[start..end] {
            let entry = &mut out[pair.bin as usize];
            entry.sum_gradients += gradients[pair.ridx as usize] as Hist;
            entry.sum_hessians += hessians[pair.ridx as usize] as Hist;
            entry.cnt += 1;
        }
    }

    fn split(&mut self, leaf: i32, right_leaf: i32, left_flags: &[u8]) {
        let l_start = self.leaf_start[leaf as usize];
        let l_end = l_start + self.leaf_cnt[leaf as usize];
        let mut new_left_end = l_start;
        for i in l_start..l_end {
            if left_flags[self.ordered_pairs[i as usize].ridx as usize] != 0 {
                self.ordered_pairs.swap(new_left_end as usize, i as usize);
                new_left_end += 1;
            }
        }
        self.leaf_start[right_leaf as usize] = new_left_end;
        self.leaf_cnt[leaf as usize] = new_left_end - l_start;
        self.leaf_cnt[right_leaf as usize] = l_end - new_left_end;
    }
}
