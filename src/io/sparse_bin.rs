//! Sparse bin column: run-length encoded non-default entries.
//!
//! Storage is two parallel arrays `(delta, val)`. `delta` is the gap to
//! the next stored row; gaps above 255 are carried by chain entries whose
//! `val` equals the column's default bin, which is never stored as a real
//! entry and therefore doubles as the skip marker.

use crate::core::error::{BoostError, Result};
use crate::core::types::{BinIndex, DataSize, Hist, Score};
use crate::io::bin::{Bin, BinIterator, BinValue, HistogramBinEntry};
use crate::io::ordered_bin::{OrderedBin, OrderedSparseBin};

/// Interval between fast-index checkpoints, in entries.
const FAST_INDEX_STRIDE: usize = 256;

pub struct SparseBin<T: BinValue> {
    num_data: DataSize,
    deltas: Vec<u8>,
    vals: Vec<T>,
    default_bin: BinIndex,
    /// Builder buffer of `(row, bin)`; drained by `finish_load`.
    push_buffer: Vec<(DataSize, T)>,
    /// Checkpoints `(row position, entry index)` for point lookups.
    fast_index: Vec<(DataSize, usize)>,
}

impl<T: BinValue> SparseBin<T> {
    pub fn new(num_data: DataSize, default_bin: BinIndex) -> Self {
        SparseBin {
            num_data,
            deltas: Vec::new(),
            vals: Vec::new(),
            default_bin,
            push_buffer: Vec::new(),
            fast_index: Vec::new(),
        }
    }

    pub fn from_bytes(payload: &[u8], num_data: DataSize, default_bin: BinIndex) -> Result<Self> {
        if payload.len() < 4 {
            return Err(BoostError::serialization("sparse bin payload truncated"));
        }
        let num_vals =
            i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
        let need = 4 + num_vals + num_vals * T::BYTES;
        if payload.len() < need {
            return Err(BoostError::serialization(format!(
                "sparse bin payload truncated: need {} bytes, have {}",
                need,
                payload.len()
            )));
        }
        let deltas = payload[4..4 + num_vals].to_vec();
        let vals = payload[4 + num_vals..need]
            .chunks_exact(T::BYTES)
            .map(T::read_le)
            .collect();
        let mut bin = SparseBin {
            num_data,
            deltas,
            vals,
            default_bin,
            push_buffer: Vec::new(),
            fast_index: Vec::new(),
        };
        bin.build_fast_index();
        Ok(bin)
    }

    fn build_fast_index(&mut self) {
        self.fast_index.clear();
        let mut pos: DataSize = 0;
        for (i, &d) in self.deltas.iter().enumerate() {
            pos += d as DataSize;
            if i % FAST_INDEX_STRIDE == 0 {
                self.fast_index.push((pos, i));
            }
        }
    }

    /// Bin of `row` by checkpointed lookup; absent rows and chain entries
    /// resolve to the default bin.
    pub fn bin_at(&self, row: DataSize) -> BinIndex {
        if self.vals.is_empty() {
            return self.default_bin;
        }
        let k = self.fast_index.partition_point(|&(pos, _)| pos <= row);
        let (mut pos, mut i) = if k == 0 {
            (self.deltas[0] as DataSize, 0)
        } else {
            self.fast_index[k - 1]
        };
        while pos < row {
            i += 1;
            if i >= self.vals.len() {
                return self.default_bin;
            }
            pos += self.deltas[i] as DataSize;
        }
        if pos == row {
            let v = self.vals[i].to_u32();
            if v != self.default_bin {
                return v;
            }
        }
        self.default_bin
    }

    /// Non-default `(row, bin)` pairs in row order.
    pub fn nonzero_pairs(&self) -> Vec<(DataSize, BinIndex)> {
        let mut pairs = Vec::new();
        let mut pos: DataSize = 0;
        for (i, &d) in self.deltas.iter().enumerate() {
            pos += d as DataSize;
            let v = self.vals[i].to_u32();
            if v != self.default_bin {
                pairs.push((pos, v));
            }
        }
        pairs
    }
}

struct SparseBinIterator<'a, T: BinValue> {
    bin: &'a SparseBin<T>,
    i: usize,
    pos: DataSize,
}

impl<'a, T: BinValue> SparseBinIterator<'a, T> {
    fn new(bin: &'a SparseBin<T>) -> Self {
        let pos = if bin.vals.is_empty() {
            bin.num_data
        } else {
            bin.deltas[0] as DataSize
        };
        SparseBinIterator { bin, i: 0, pos }
    }

    fn advance(&mut self) {
        self.i += 1;
        if self.i < self.bin.vals.len() {
            self.pos += self.bin.deltas[self.i] as DataSize;
        } else {
            self.pos = self.bin.num_data;
        }
    }
}

impl<'a, T: BinValue> BinIterator for SparseBinIterator<'a, T> {
    fn get(&mut self, row: DataSize) -> BinIndex {
        while self.pos < row && self.i < self.bin.vals.len() {
            self.advance();
        }
        if self.pos == row && self.i < self.bin.vals.len() {
            let v = self.bin.vals[self.i].to_u32();
            if v != self.bin.default_bin {
                return v;
            }
        }
        self.bin.default_bin
    }
}

impl<T: BinValue> Bin for SparseBin<T> {
    fn num_data(&self) -> DataSize {
        self.num_data
    }

    fn push(&mut self, row: DataSize, bin: BinIndex) {
        if bin != self.default_bin {
            self.push_buffer.push((row, T::from_u32(bin)));
        }
    }

    fn finish_load(&mut self) {
        let mut buffer = std::mem::take(&mut self.push_buffer);
        buffer.sort_unstable_by_key(|&(row, _)| row);
        self.deltas.clear();
        self.vals.clear();
        let sentinel = T::from_u32(self.default_bin);
        let mut last: DataSize = 0;
        for (row, val) in buffer {
            let mut gap = row - last;
            while gap > u8::MAX as DataSize {
                self.deltas.push(u8::MAX);
                self.vals.push(sentinel);
                gap -= u8::MAX as DataSize;
            }
            self.deltas.push(gap as u8);
            self.vals.push(val);
            last = row;
        }
        self.deltas.shrink_to_fit();
        self.vals.shrink_to_fit();
        self.build_fast_index();
    }

    fn construct_histogram(
        &self,
        indices: &[DataSize],
        ordered_gradients: &[Score],
        ordered_hessians: &[Score],
        out: &mut [HistogramBinEntry],
    ) {
        // Leaf rows are not sorted after a split, so this is the
        // point-lookup path; the ordered bin covers the hot path.
        for (i, &idx) in indices.iter().enumerate() {
            let bin = self.bin_at(idx) as usize;
            let entry = &mut out[bin];
            entry.sum_gradients += ordered_gradients[i] as Hist;
            entry.sum_hessians += ordered_hessians[i] as Hist;
            entry.cnt += 1;
        }
    }

    fn split(
        &self,
        threshold: BinIndex,
        default_bin: BinIndex,
        default_left: bool,
        indices: &[DataSize],
        lte_out: &mut [DataSize],
        gt_out: &mut [DataSize],
    ) -> DataSize {
        let mut lte = 0usize;
        let mut gt = 0usize;
        for &idx in indices {
            let bin = self.bin_at(idx);
            let go_left = if bin == default_bin {
                default_left
            } else {
                bin <= threshold
            };
            if go_left {
                lte_out[lte] = idx;
                lte += 1;
            } else {
                gt_out[gt] = idx;
                gt += 1;
            }
        }
        lte as DataSize
    }

    fn create_ordered_bin(&self) -> Option<Box<dyn OrderedBin>> {
        Some(Box::new(OrderedSparseBin::new(
            self.nonzero_pairs(),
            self.num_data,
        )))
    }

    fn iterator(&self) -> Box<dyn BinIterator + '_> {
        Box::new(SparseBinIterator::new(self))
    }

    fn encoding_tag(&self) -> u8 {
        T::TAG_SPARSE
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.vals.len() as i32).to_le_bytes());
        out.extend_from_slice(&self.deltas);
        for &v in &self.vals {
            v.write_le(out);
        }
    }

    fn sizes_in_byte(&self) -> usize {
        1 + 4 + self.vals.len() + self.vals.len() * T::BYTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(num_data: DataSize, entries: &[(DataSize, u32)]) -> SparseBin<u8> {
        let mut b = SparseBin::<u8>::new(num_data, 0);
        for &(row, bin) in entries {
            b.push(row, bin);
        }
        b.finish_load();
        b
    }

    #[test]
    fn point_lookup_matches_pushed_values() {
        let entries = [(3, 2u32), (5, 1), (700, 3), (701, 2)];
        let b = build(1000, &entries);
        for &(row, bin) in &entries {
            assert_eq!(b.bin_at(row), bin);
        }
        assert_eq!(b.bin_at(0), 0);
        assert_eq!(b.bin_at(4), 0);
        assert_eq!(b.bin_at(999), 0);
    }

    #[test]
    fn gap_overflow_uses_chain_entries() {
        let b = build(2000, &[(0, 1), (900, 2)]);
        // gap 900 needs chain entries of 255
        assert!(b.deltas.len() > 2);
        assert_eq!(b.bin_at(900), 2);
        assert_eq!(b.bin_at(255), 0);
    }

    #[test]
    fn sequential_iterator_agrees_with_point_lookup() {
        let entries = [(10, 3u32), (11, 1), (256, 2), (999, 3)];
        let b = build(1000, &entries);
        let mut it = b.iterator();
        for row in 0..1000 {
            assert_eq!(it.get(row), b.bin_at(row), "row {}", row);
        }
    }

    #[test]
    fn histogram_routes_absent_rows_to_default() {
        let b = build(100, &[(5, 1), (7, 2)]);
        let indices: Vec<DataSize> = vec![7, 5, 6];
        let g = vec![1.0f32; 3];
        let h = vec![1.0f32; 3];
        let mut out = vec![HistogramBinEntry::default(); 3];
        b.construct_histogram(&indices, &g, &h, &mut out);
        assert_eq!(out[0].cnt, 1);
        assert_eq!(out[1].cnt, 1);
        assert_eq!(out[2].cnt, 1);
    }

    #[test]
    fn binary_roundtrip() {
        let entries = [(3, 2u32), (700, 3), (999, 1)];
        let b = build(1000, &entries);
        let mut payload = Vec::new();
        b.write_to(&mut payload);
        let restored = SparseBin::<u8>::from_bytes(&payload, 1000, 0).unwrap();
        for row in 0..1000 {
            assert_eq!(restored.bin_at(row), b.bin_at(row));
        }
    }
}
