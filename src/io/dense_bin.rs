//! Dense bin column: one packed integer per row, random access.

use crate::core::error::{BoostError, Result};
use crate::core::types::{BinIndex, DataSize, Hist, Score};
use crate::io::bin::{Bin, BinIterator, BinValue, HistogramBinEntry};
use crate::io::ordered_bin::OrderedBin;

/// Dense storage; `T` is u8/u16/u32 depending on the feature's bin count.
pub struct DenseBin<T: BinValue> {
    num_data: DataSize,
    data: Vec<T>,
}

impl<T: BinValue> DenseBin<T> {
    /// Rows that are never pushed read as `default_bin` (sparse text
    /// shapes only list non-zero values).
    pub fn new(num_data: DataSize, default_bin: BinIndex) -> Self {
        DenseBin {
            num_data,
            data: vec![T::from_u32(default_bin); num_data as usize],
        }
    }

    pub fn from_bytes(payload: &[u8], num_data: DataSize) -> Result<Self> {
        let expect = num_data as usize * T::BYTES;
        if payload.len() < expect {
            return Err(BoostError::serialization(format!(
                "dense bin payload truncated: need {} bytes, have {}",
                expect,
                payload.len()
            )));
        }
        let data = payload[..expect]
            .chunks_exact(T::BYTES)
            .map(T::read_le)
            .collect();
        Ok(DenseBin { num_data, data })
    }

    #[inline]
    pub fn bin_at(&self, row: DataSize) -> BinIndex {
        self.data[row as usize].to_u32()
    }
}

struct DenseBinIterator<'a, T: BinValue> {
    data: &'a [T],
}

impl<'a, T: BinValue> BinIterator for DenseBinIterator<'a, T> {
    fn get(&mut self, row: DataSize) -> BinIndex {
        self.data[row as usize].to_u32()
    }
}

impl<T: BinValue> Bin for DenseBin<T> {
    fn num_data(&self) -> DataSize {
        self.num_data
    }

    fn push(&mut self, row: DataSize, bin: BinIndex) {
        self.data[row as usize] = T::from_u32(bin);
    }

    fn finish_load(&mut self) {}

    fn construct_histogram(
        &self,
        indices: &[DataSize],
        ordered_gradients: &[Score],
        ordered_hessians: &[Score],
        out: &mut [HistogramBinEntry],
    ) {
        for (i, &idx) in indices.iter().enumerate() {
            let bin = self.data[idx as usize].to_u32() as usize;
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
            let bin = self.data[idx as usize].to_u32();
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
        None
    }

    fn iterator(&self) -> Box<dyn BinIterator + '_> {
        Box::new(DenseBinIterator { data: &self.data })
    }

    fn encoding_tag(&self) -> u8 {
        T::TAG_DENSE
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        for &v in &self.data {
            v.write_le(out);
        }
    }

    fn sizes_in_byte(&self) -> usize {
        1 + self.data.len() * T::BYTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(bins: &[u32]) -> DenseBin<u8> {
        let mut b = DenseBin::<u8>::new(bins.len() as DataSize, 0);
        for (row, &bin) in bins.iter().enumerate() {
            b.push(row as DataSize, bin);
        }
        b.finish_load();
        b
    }

    #[test]
    fn histogram_counts_every_row() {
        let b = build(&[0, 1, 2, 1, 0, 2, 2]);
        let indices: Vec<DataSize> = (0..7).collect();
        let g = vec![1.0f32; 7];
        let h = vec![0.5f32; 7];
        let mut out = vec![HistogramBinEntry::default(); 3];
        b.construct_histogram(&indices, &g, &h, &mut out);
        assert_eq!(out[0].cnt, 2);
        assert_eq!(out[1].cnt, 2);
        assert_eq!(out[2].cnt, 3);
        assert_eq!(out[2].sum_gradients, 3.0);
        assert_eq!(out[2].sum_hessians, 1.5);
    }

    #[test]
    fn split_routes_default_bin_by_flag() {
        let b = build(&[0, 1, 2, 1, 0]);
        let indices: Vec<DataSize> = (0..5).collect();
        let mut lte = vec![0; 5];
        let mut gt = vec![0; 5];
        // threshold 1, default bin 0 forced right
        let left = b.split(1, 0, false, &indices, &mut lte, &mut gt);
        assert_eq!(left, 2);
        assert_eq!(&lte[..2], &[1, 3]);
        let mut right_sorted = gt[..3].to_vec();
        right_sorted.sort_unstable();
        assert_eq!(right_sorted, vec![0, 2, 4]);
    }

    #[test]
    fn binary_roundtrip() {
        let b = build(&[3, 0, 7, 7, 1]);
        let mut payload = Vec::new();
        b.write_to(&mut payload);
        let restored = DenseBin::<u8>::from_bytes(&payload, 5).unwrap();
        for row in 0..5 {
            assert_eq!(restored.bin_at(row), b.bin_at(row));
        }
    }
}
