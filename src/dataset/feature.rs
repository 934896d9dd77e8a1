//! One used feature: its bin mapper plus its binned column.

use crate::core::error::{BoostError, Result};
use crate::core::types::{BinIndex, DataSize};
use crate::dataset::bin_mapper::BinMapper;
use crate::io::bin::{bin_from_bytes, create_bin, Bin};
use crate::io::ordered_bin::OrderedBin;

pub struct Feature {
    /// Column index in the raw data.
    feature_index: i32,
    bin_mapper: BinMapper,
    bin_data: Box<dyn Bin>,
}

impl Feature {
    pub fn new(
        feature_index: i32,
        bin_mapper: BinMapper,
        num_data: DataSize,
        is_enable_sparse: bool,
    ) -> Self {
        let bin_data = create_bin(
            num_data,
            bin_mapper.num_bin(),
            bin_mapper.sparse_rate(),
            is_enable_sparse,
            bin_mapper.default_bin(),
        );
        Feature {
            feature_index,
            bin_mapper,
            bin_data,
        }
    }

    /// Bins and stores one raw value.
    pub fn push(&mut self, row: DataSize, value: f64) {
        let bin = self.bin_mapper.value_to_bin(value);
        self.bin_data.push(row, bin);
    }

    /// Stores an already-binned value (binary reload path).
    pub fn push_bin(&mut self, row: DataSize, bin: BinIndex) {
        self.bin_data.push(row, bin);
    }

    pub fn finish_load(&mut self) {
        self.bin_data.finish_load();
    }

    pub fn feature_index(&self) -> i32 {
        self.feature_index
    }

    pub fn bin_mapper(&self) -> &BinMapper {
        &self.bin_mapper
    }

    pub fn num_bin(&self) -> i32 {
        self.bin_mapper.num_bin()
    }

    pub fn bin_data(&self) -> &dyn Bin {
        self.bin_data.as_ref()
    }

    pub fn is_sparse(&self) -> bool {
        self.bin_data.encoding_tag() >= crate::io::bin::TAG_SPARSE_U8
    }

    pub fn create_ordered_bin(&self) -> Option<Box<dyn OrderedBin>> {
        self.bin_data.create_ordered_bin()
    }

    /// Feature blob: `i32 feature_index, i32 num_bin,
    /// f64 bin_upper_bound[num_bin], u8 encoding_tag, payload`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.feature_index.to_le_bytes());
        out.extend_from_slice(&self.bin_mapper.num_bin().to_le_bytes());
        for &b in self.bin_mapper.bin_upper_bound() {
            out.extend_from_slice(&b.to_le_bytes());
        }
        out.push(self.bin_data.encoding_tag());
        self.bin_data.write_to(out);
    }

    pub fn sizes_in_byte(&self) -> usize {
        4 + 4 + 8 * self.bin_mapper.num_bin() as usize + self.bin_data.sizes_in_byte()
    }

    pub fn from_bytes(bytes: &[u8], num_data: DataSize) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(BoostError::serialization("feature blob truncated"));
        }
        let feature_index = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let num_bin = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if num_bin < 1 {
            return Err(BoostError::serialization("feature blob has no bins"));
        }
        let bounds_end = 8 + 8 * num_bin as usize;
        if bytes.len() < bounds_end + 1 {
            return Err(BoostError::serialization("feature blob truncated"));
        }
        let bounds: Vec<f64> = bytes[8..bounds_end]
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        let bin_mapper = BinMapper::from_boundaries(bounds)?;
        let bin_data = bin_from_bytes(&bytes[bounds_end..], num_data, bin_mapper.default_bin())?;
        Ok(Feature {
            feature_index,
            bin_mapper,
            bin_data,
        })
    }
}

impl std::fmt::Debug for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feature")
            .field("feature_index", &self.feature_index)
            .field("num_bin", &self.bin_mapper.num_bin())
            .field("sparse", &self.is_sparse())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_roundtrips_through_bytes() {
        let values: Vec<f64> = (0..100).map(|i| (i % 7) as f64).collect();
        let mapper = BinMapper::find_bin(&values, values.len(), 16);
        let mut feature = Feature::new(3, mapper, 100, true);
        for (row, &v) in values.iter().enumerate() {
            feature.push(row as DataSize, v);
        }
        feature.finish_load();

        let mut blob = Vec::new();
        feature.write_to(&mut blob);
        assert_eq!(blob.len(), feature.sizes_in_byte());

        let restored = Feature::from_bytes(&blob, 100).unwrap();
        assert_eq!(restored.feature_index(), 3);
        assert_eq!(restored.num_bin(), feature.num_bin());
        assert_eq!(
            restored.bin_mapper().bin_upper_bound(),
            feature.bin_mapper().bin_upper_bound()
        );
        let mut a = feature.bin_data().iterator();
        let mut b = restored.bin_data().iterator();
        for row in 0..100 {
            assert_eq!(a.get(row), b.get(row));
        }
    }
}
