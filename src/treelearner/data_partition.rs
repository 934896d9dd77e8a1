//! Leaf-wise partition of row indices during tree construction.
//!
//! `indices` is a permutation of the (bagged) rows ordered by leaf:
//! `indices[leaf_begin[l]..leaf_begin[l]+leaf_count[l]]` are the rows of
//! leaf `l`. A split repartitions one leaf's range in place with a
//! two-pass parallel scheme: per-chunk counting into temp buffers, a
//! serial prefix scan for write offsets, then a parallel copy-back.

use crate::core::constants::K_MIN_SPLIT_BLOCK_SIZE;
use crate::core::types::{BinIndex, DataSize};
use crate::core::utils::common::block_info;
use crate::core::utils::threading::num_threads;
use crate::io::bin::Bin;
use rayon::prelude::*;

pub struct DataPartition {
    num_data: DataSize,
    num_leaves: usize,
    leaf_begin: Vec<DataSize>,
    leaf_count: Vec<DataSize>,
    indices: Vec<DataSize>,
    temp_left: Vec<DataSize>,
    temp_right: Vec<DataSize>,
    /// Bagged subset; empty means all rows are used.
    used_data_indices: Vec<DataSize>,
}

impl DataPartition {
    pub fn new(num_data: DataSize, num_leaves: usize) -> Self {
        DataPartition {
            num_data,
            num_leaves,
            leaf_begin: vec![0; num_leaves],
            leaf_count: vec![0; num_leaves],
            indices: vec![0; num_data as usize],
            temp_left: vec![0; num_data as usize],
            temp_right: vec![0; num_data as usize],
            used_data_indices: Vec::new(),
        }
    }

    /// Installs a bagging subset used by the next `init`.
    pub fn set_used_data_indices(&mut self, used: &[DataSize]) {
        self.used_data_indices = used.to_vec();
    }

    pub fn clear_used_data_indices(&mut self) {
        self.used_data_indices.clear();
    }

    /// Puts every used row into leaf 0.
    pub fn init(&mut self) {
        self.leaf_begin.fill(0);
        self.leaf_count.fill(0);
        if self.used_data_indices.is_empty() {
            self.leaf_count[0] = self.num_data;
            self.indices
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, idx)| *idx = i as DataSize);
        } else {
            self.leaf_count[0] = self.used_data_indices.len() as DataSize;
            self.indices[..self.used_data_indices.len()].copy_from_slice(&self.used_data_indices);
        }
    }

    pub fn leaf_count(&self, leaf: i32) -> DataSize {
        self.leaf_count[leaf as usize]
    }

    pub fn leaf_begin(&self, leaf: i32) -> DataSize {
        self.leaf_begin[leaf as usize]
    }

    /// Rows currently in `leaf`.
    pub fn leaf_indices(&self, leaf: i32) -> &[DataSize] {
        let begin = self.leaf_begin[leaf as usize] as usize;
        let count = self.leaf_count[leaf as usize] as usize;
        &self.indices[begin..begin + count]
    }

    pub fn used_data_count(&self) -> DataSize {
        if self.used_data_indices.is_empty() {
            self.num_data
        } else {
            self.used_data_indices.len() as DataSize
        }
    }

    /// Splits `leaf` on `bin <= threshold`; left rows keep the leaf id,
    /// right rows become `right_leaf` immediately after them.
    pub fn split(
        &mut self,
        leaf: i32,
        bin: &dyn Bin,
        threshold: BinIndex,
        default_bin: BinIndex,
        default_left: bool,
        right_leaf: i32,
    ) -> DataSize {
        let begin = self.leaf_begin[leaf as usize] as usize;
        let cnt = self.leaf_count[leaf as usize] as usize;
        let (num_blocks, block_size) =
            block_info(cnt as DataSize, num_threads(), K_MIN_SPLIT_BLOCK_SIZE);
        let block_size = block_size as usize;

        // pass one: partition each chunk into its temp slices
        let leaf_rows = &self.indices[begin..begin + cnt];
        let counts: Vec<(usize, usize)> = self.temp_left[..cnt]
            .par_chunks_mut(block_size)
            .zip(self.temp_right[..cnt].par_chunks_mut(block_size))
            .enumerate()
            .map(|(i, (left_buf, right_buf))| {
                let start = i * block_size;
                let end = (start + block_size).min(cnt);
                let rows = &leaf_rows[start..end];
                let left = bin.split(
                    threshold,
                    default_bin,
                    default_left,
                    rows,
                    &mut left_buf[..rows.len()],
                    &mut right_buf[..rows.len()],
                ) as usize;
                (left, rows.len() - left)
            })
            .collect();

        // serial scan for write offsets
        let mut left_offsets = vec![0usize; num_blocks];
        let mut right_offsets = vec![0usize; num_blocks];
        let mut left_total = 0usize;
        let mut right_total = 0usize;
        for i in 0..num_blocks {
            left_offsets[i] = left_total;
            right_offsets[i] = right_total;
            left_total += counts[i].0;
            right_total += counts[i].1;
        }

        // pass two: copy chunks back, left rows first
        let region = &mut self.indices[begin..begin + cnt];
        let (left_region, right_region) = region.split_at_mut(left_total);
        let mut left_parts: Vec<&mut [DataSize]> = Vec::with_capacity(num_blocks);
        let mut right_parts: Vec<&mut [DataSize]> = Vec::with_capacity(num_blocks);
        {
            let mut rest: &mut [DataSize] = left_region;
            let mut rrest: &mut [DataSize] = right_region;
            for i in 0..num_blocks {
                let (part, next) = std::mem::take(&mut rest).split_at_mut(counts[i].0);
                left_parts.push(part);
                rest = next;
                let (rpart, rnext) = std::mem::take(&mut rrest).split_at_mut(counts[i].1);
                right_parts.push(rpart);
                rrest = rnext;
            }
        }
        left_parts
            .into_par_iter()
            .zip(right_parts.into_par_iter())
            .enumerate()
            .for_each(|(i, (left_part, right_part))| {
                let start = i * block_size;
                left_part.copy_from_slice(&self.temp_left[start..start + counts[i].0]);
                right_part.copy_from_slice(&self.temp_right[start..start + counts[i].1]);
            });

        self.leaf_count[leaf as usize] = left_total as DataSize;
        self.leaf_begin[right_leaf as usize] = (begin + left_total) as DataSize;
        self.leaf_count[right_leaf as usize] = right_total as DataSize;
        left_total as DataSize
    }

    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dense_bin::DenseBin;

    fn bin_with(values: &[u32]) -> DenseBin<u8> {
        let mut b = DenseBin::<u8>::new(values.len() as DataSize, 0);
        for (row, &v) in values.iter().enumerate() {
            use crate::io::bin::Bin;
            b.push(row as DataSize, v);
        }
        b
    }

    #[test]
    fn init_covers_all_rows() {
        let mut p = DataPartition::new(100, 8);
        p.init();
        assert_eq!(p.leaf_count(0), 100);
        let rows = p.leaf_indices(0);
        let mut sorted = rows.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_a_total_partition() {
        let num_data = 5000;
        let values: Vec<u32> = (0..num_data).map(|i| (i * 7 % 16) as u32).collect();
        let bin = bin_with(&values);
        let mut p = DataPartition::new(num_data as DataSize, 8);
        p.init();
        let left = p.split(0, &bin, 7, 0, true, 1);
        let expected_left = values.iter().filter(|&&v| v <= 7).count();
        assert_eq!(left as usize, expected_left);
        assert_eq!(p.leaf_count(0) + p.leaf_count(1), num_data as DataSize);

        // every row appears exactly once and lands on the right side
        let mut seen = vec![false; num_data];
        for &row in p.leaf_indices(0) {
            assert!(values[row as usize] <= 7);
            assert!(!seen[row as usize]);
            seen[row as usize] = true;
        }
        for &row in p.leaf_indices(1) {
            assert!(values[row as usize] > 7);
            assert!(!seen[row as usize]);
            seen[row as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn nested_splits_keep_totals() {
        let num_data = 3000;
        let values: Vec<u32> = (0..num_data).map(|i| (i % 10) as u32).collect();
        let bin = bin_with(&values);
        let mut p = DataPartition::new(num_data as DataSize, 8);
        p.init();
        p.split(0, &bin, 4, 0, true, 1);
        p.split(0, &bin, 1, 0, true, 2);
        p.split(1, &bin, 7, 0, true, 3);
        let total: DataSize = (0..4).map(|l| p.leaf_count(l)).sum();
        assert_eq!(total, num_data as DataSize);
        for &row in p.leaf_indices(2) {
            let v = values[row as usize];
            assert!(v > 1 && v <= 4);
        }
        for &row in p.leaf_indices(3) {
            assert!(values[row as usize] > 7);
        }
    }

    #[test]
    fn bagging_restricts_the_root() {
        let mut p = DataPartition::new(100, 4);
        let bag: Vec<DataSize> = (0..100).step_by(2).collect();
        p.set_used_data_indices(&bag);
        p.init();
        assert_eq!(p.leaf_count(0), 50);
        assert_eq!(p.used_data_count(), 50);
        assert!(p.leaf_indices(0).iter().all(|&r| r % 2 == 0));
    }
}
