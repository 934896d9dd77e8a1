//! Binned feature column interface.
//!
//! A `Bin` stores the bin index of one feature for every row, either
//! densely (one packed integer per row) or sparsely (run-length encoded
//! non-default entries). Histogram construction and threshold splits are
//! the two operations tree learning needs from a column.

use crate::core::error::{BoostError, Result};
use crate::core::types::{BinIndex, DataSize, Hist, Score};
use crate::io::dense_bin::DenseBin;
use crate::io::ordered_bin::OrderedBin;
use crate::io::sparse_bin::SparseBin;

/// One histogram bin: gradient sum, hessian sum and row count.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramBinEntry {
    pub sum_gradients: Hist,
    pub sum_hessians: Hist,
    pub cnt: u32,
}

impl HistogramBinEntry {
    /// Adds `other` into `self`, field-wise.
    pub fn sum_up(&mut self, other: &HistogramBinEntry) {
        self.sum_gradients += other.sum_gradients;
        self.sum_hessians += other.sum_hessians;
        self.cnt += other.cnt;
    }

    /// Subtracts `other` from `self`, field-wise. Used by the
    /// parent-minus-sibling histogram trick.
    pub fn subtract(&mut self, other: &HistogramBinEntry) {
        self.sum_gradients -= other.sum_gradients;
        self.sum_hessians -= other.sum_hessians;
        self.cnt -= other.cnt;
    }
}

/// Sequential reader over a bin column. `get` must be called with
/// non-decreasing row indices; sparse columns walk their entry list
/// forward and never rewind.
pub trait BinIterator {
    fn get(&mut self, row: DataSize) -> BinIndex;
}

/// Binned storage of one feature column.
pub trait Bin: Send + Sync {
    fn num_data(&self) -> DataSize;

    /// Records the bin of one row. Builder phase only; a column is built
    /// by a single thread and sealed by [`Bin::finish_load`].
    fn push(&mut self, row: DataSize, bin: BinIndex);

    /// Seals the column after the last `push`.
    fn finish_load(&mut self);

    /// Accumulates the leaf histogram. `ordered_gradients[i]` belongs to
    /// row `indices[i]`.
    fn construct_histogram(
        &self,
        indices: &[DataSize],
        ordered_gradients: &[Score],
        ordered_hessians: &[Score],
        out: &mut [HistogramBinEntry],
    );

    /// Partitions `indices` by `bin <= threshold`; rows at `default_bin`
    /// go left iff `default_left`. Returns the number of rows written to
    /// `lte_out`; the rest are in `gt_out`.
    fn split(
        &self,
        threshold: BinIndex,
        default_bin: BinIndex,
        default_left: bool,
        indices: &[DataSize],
        lte_out: &mut [DataSize],
        gt_out: &mut [DataSize],
    ) -> DataSize;

    /// Leaf-grouped view for cache-friendly histograms. Only sparse
    /// columns provide one.
    fn create_ordered_bin(&self) -> Option<Box<dyn OrderedBin>>;

    /// Sequential point reader, used when scoring binned rows.
    fn iterator(&self) -> Box<dyn BinIterator + '_>;

    /// Encoding tag written ahead of the payload in the binary dataset
    /// format.
    fn encoding_tag(&self) -> u8;

    /// Appends the binary payload (without the tag).
    fn write_to(&self, out: &mut Vec<u8>);

    /// Payload size in bytes, tag included.
    fn sizes_in_byte(&self) -> usize;
}

pub(crate) const TAG_DENSE_U8: u8 = 0x01;
pub(crate) const TAG_DENSE_U16: u8 = 0x02;
pub(crate) const TAG_DENSE_U32: u8 = 0x03;
pub(crate) const TAG_SPARSE_U8: u8 = 0x11;
pub(crate) const TAG_SPARSE_U16: u8 = 0x12;
pub(crate) const TAG_SPARSE_U32: u8 = 0x13;

/// Integer widths a bin column can be stored at.
pub(crate) trait BinValue: Copy + Default + Send + Sync + 'static {
    const BYTES: usize;
    const TAG_DENSE: u8;
    const TAG_SPARSE: u8;
    fn from_u32(v: u32) -> Self;
    fn to_u32(self) -> u32;
    fn write_le(self, out: &mut Vec<u8>);
    fn read_le(bytes: &[u8]) -> Self;
}

impl BinValue for u8 {
    const BYTES: usize = 1;
    const TAG_DENSE: u8 = TAG_DENSE_U8;
    const TAG_SPARSE: u8 = TAG_SPARSE_U8;
    fn from_u32(v: u32) -> Self {
        v as u8
    }
    fn to_u32(self) -> u32 {
        self as u32
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl BinValue for u16 {
    const BYTES: usize = 2;
    const TAG_DENSE: u8 = TAG_DENSE_U16;
    const TAG_SPARSE: u8 = TAG_SPARSE_U16;
    fn from_u32(v: u32) -> Self {
        v as u16
    }
    fn to_u32(self) -> u32 {
        self as u32
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
    fn read_le(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl BinValue for u32 {
    const BYTES: usize = 4;
    const TAG_DENSE: u8 = TAG_DENSE_U32;
    const TAG_SPARSE: u8 = TAG_SPARSE_U32;
    fn from_u32(v: u32) -> Self {
        v
    }
    fn to_u32(self) -> u32 {
        self
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
    fn read_le(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Chooses the storage for a feature column: integer width from
/// `num_bin`, dense or sparse from the sample's `sparse_rate`.
pub fn create_bin(
    num_data: DataSize,
    num_bin: i32,
    sparse_rate: f64,
    is_enable_sparse: bool,
    default_bin: BinIndex,
) -> Box<dyn Bin> {
    let sparse = is_enable_sparse && sparse_rate >= crate::core::constants::K_SPARSE_THRESHOLD;
    if sparse {
        if num_bin <= 256 {
            Box::new(SparseBin::<u8>::new(num_data, default_bin))
        } else if num_bin <= 65536 {
            Box::new(SparseBin::<u16>::new(num_data, default_bin))
        } else {
            Box::new(SparseBin::<u32>::new(num_data, default_bin))
        }
    } else if num_bin <= 256 {
        Box::new(DenseBin::<u8>::new(num_data, default_bin))
    } else if num_bin <= 65536 {
        Box::new(DenseBin::<u16>::new(num_data, default_bin))
    } else {
        Box::new(DenseBin::<u32>::new(num_data, default_bin))
    }
}

/// Restores a bin column from a binary payload, tag first.
pub fn bin_from_bytes(
    bytes: &[u8],
    num_data: DataSize,
    default_bin: BinIndex,
) -> Result<Box<dyn Bin>> {
    if bytes.is_empty() {
        return Err(BoostError::serialization("empty feature payload"));
    }
    let tag = bytes[0];
    let payload = &bytes[1..];
    let bin: Box<dyn Bin> = match tag {
        TAG_DENSE_U8 => Box::new(DenseBin::<u8>::from_bytes(payload, num_data)?),
        TAG_DENSE_U16 => Box::new(DenseBin::<u16>::from_bytes(payload, num_data)?),
        TAG_DENSE_U32 => Box::new(DenseBin::<u32>::from_bytes(payload, num_data)?),
        TAG_SPARSE_U8 => Box::new(SparseBin::<u8>::from_bytes(payload, num_data, default_bin)?),
        TAG_SPARSE_U16 => Box::new(SparseBin::<u16>::from_bytes(payload, num_data, default_bin)?),
        TAG_SPARSE_U32 => Box::new(SparseBin::<u32>::from_bytes(payload, num_data, default_bin)?),
        _ => {
            return Err(BoostError::serialization(format!(
                "unknown bin encoding tag 0x{:02x}",
                tag
            )))
        }
    };
    Ok(bin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_sum_and_subtract_are_inverse() {
        let mut a = HistogramBinEntry {
            sum_gradients: 1.5,
            sum_hessians: 2.0,
            cnt: 3,
        };
        let b = HistogramBinEntry {
            sum_gradients: 0.5,
            sum_hessians: 1.0,
            cnt: 2,
        };
        a.sum_up(&b);
        a.subtract(&b);
        assert_eq!(a.sum_gradients, 1.5);
        assert_eq!(a.sum_hessians, 2.0);
        assert_eq!(a.cnt, 3);
    }

    #[test]
    fn create_bin_picks_width_and_kind() {
        let b = create_bin(100, 200, 0.0, true, 0);
        assert_eq!(b.encoding_tag(), TAG_DENSE_U8);
        let b = create_bin(100, 300, 0.0, true, 0);
        assert_eq!(b.encoding_tag(), TAG_DENSE_U16);
        let b = create_bin(100, 200, 0.95, true, 0);
        assert_eq!(b.encoding_tag(), TAG_SPARSE_U8);
        // sparse disabled keeps the dense layout
        let b = create_bin(100, 200, 0.95, false, 0);
        assert_eq!(b.encoding_tag(), TAG_DENSE_U8);
    }
}
