//! The training dataset: used features, their binned columns and the
//! metadata aggregate. Immutable once loading finishes.

use crate::core::error::{BoostError, Result};
use crate::core::types::{DataSize, Label};
use crate::core::utils::log::Log;
use crate::dataset::bin_mapper::BinMapper;
use crate::dataset::feature::Feature;
use crate::dataset::metadata::Metadata;
use ndarray::ArrayView2;
use rayon::prelude::*;
use std::io::{Read, Write};

pub struct Dataset {
    pub(crate) data_filename: String,
    pub(crate) num_data: DataSize,
    pub(crate) num_class: i32,
    pub(crate) num_total_features: i32,
    /// Raw column index -> used feature index, -1 for skipped columns.
    pub(crate) used_feature_map: Vec<i32>,
    pub(crate) features: Vec<Feature>,
    pub(crate) feature_names: Vec<String>,
    pub(crate) label_idx: i32,
    pub(crate) metadata: Metadata,
}

impl Dataset {
    /// Builds a dataset from an in-memory matrix (rows x columns). Bin
    /// mappers are fitted on the full column values.
    pub fn from_matrix(
        features: ArrayView2<'_, f64>,
        labels: &[Label],
        max_bin: i32,
        is_enable_sparse: bool,
        num_class: i32,
    ) -> Result<Self> {
        let num_data = features.nrows() as DataSize;
        let num_total_features = features.ncols() as i32;
        if labels.len() != num_data as usize {
            return Err(BoostError::dataset(format!(
                "label size {} does not match row count {}",
                labels.len(),
                num_data
            )));
        }
        let mappers: Vec<BinMapper> = (0..features.ncols())
            .into_par_iter()
            .map(|col| {
                let non_zero: Vec<f64> = features
                    .column(col)
                    .iter()
                    .copied()
                    .filter(|v| !v.is_nan() && v.abs() > crate::dataset::bin_mapper::K_ZERO_BOUND)
                    .collect();
                BinMapper::find_bin(&non_zero, num_data as usize, max_bin)
            })
            .collect();

        let mut used_feature_map = vec![-1i32; num_total_features as usize];
        let mut built: Vec<Feature> = Vec::new();
        for (col, mapper) in mappers.into_iter().enumerate() {
            if mapper.is_trivial() {
                continue;
            }
            used_feature_map[col] = built.len() as i32;
            built.push(Feature::new(col as i32, mapper, num_data, is_enable_sparse));
        }
        if built.is_empty() {
            return Err(BoostError::dataset(
                "no usable feature: every column is constant",
            ));
        }
        built.par_iter_mut().for_each(|feature| {
            let col = feature.feature_index() as usize;
            for row in 0..num_data {
                feature.push(row, features[(row as usize, col)]);
            }
            feature.finish_load();
        });

        let mut metadata = Metadata::new(num_data, num_class);
        metadata.set_label(labels.to_vec())?;
        metadata.check_labels()?;

        Ok(Dataset {
            data_filename: String::new(),
            num_data,
            num_class,
            num_total_features,
            used_feature_map,
            features: built,
            feature_names: (0..num_total_features).map(|i| format!("Column_{}", i)).collect(),
            label_idx: 0,
            metadata,
        })
    }

    /// Builds a validation dataset binned with `train`'s mappers so bin
    /// indices line up.
    pub fn from_matrix_aligned(
        train: &Dataset,
        features: ArrayView2<'_, f64>,
        labels: &[Label],
        is_enable_sparse: bool,
    ) -> Result<Self> {
        let num_data = features.nrows() as DataSize;
        if features.ncols() as i32 != train.num_total_features {
            return Err(BoostError::dataset(format!(
                "validation data has {} columns, training data has {}",
                features.ncols(),
                train.num_total_features
            )));
        }
        if labels.len() != num_data as usize {
            return Err(BoostError::dataset(format!(
                "label size {} does not match row count {}",
                labels.len(),
                num_data
            )));
        }
        let mut built: Vec<Feature> = train
            .features
            .iter()
            .map(|f| {
                Feature::new(
                    f.feature_index(),
                    f.bin_mapper().clone(),
                    num_data,
                    is_enable_sparse,
                )
            })
            .collect();
        built.par_iter_mut().for_each(|feature| {
            let col = feature.feature_index() as usize;
            for row in 0..num_data {
                feature.push(row, features[(row as usize, col)]);
            }
            feature.finish_load();
        });
        let mut metadata = Metadata::new(num_data, train.num_class);
        metadata.set_label(labels.to_vec())?;
        metadata.check_labels()?;
        Ok(Dataset {
            data_filename: String::new(),
            num_data,
            num_class: train.num_class,
            num_total_features: train.num_total_features,
            used_feature_map: train.used_feature_map.clone(),
            features: built,
            feature_names: train.feature_names.clone(),
            label_idx: train.label_idx,
            metadata,
        })
    }

    pub fn num_data(&self) -> DataSize {
        self.num_data
    }

    pub fn num_class(&self) -> i32 {
        self.num_class
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn num_total_features(&self) -> i32 {
        self.num_total_features
    }

    pub fn label_idx(&self) -> i32 {
        self.label_idx
    }

    pub fn feature_at(&self, inner_idx: usize) -> &Feature {
        &self.features[inner_idx]
    }

    /// Used feature index of a raw column, -1 when the column is skipped.
    pub fn inner_feature_index(&self, real_idx: i32) -> i32 {
        self.used_feature_map[real_idx as usize]
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Writes the little-endian binary dataset file.
    pub fn save_binary_file(&self, bin_filename: Option<&str>) -> Result<String> {
        let path = match bin_filename {
            Some(p) => p.to_string(),
            None => format!("{}.bin", self.data_filename),
        };
        let mut out: Vec<u8> = Vec::new();

        // header: counts, used feature map, feature names
        let mut header: Vec<u8> = Vec::new();
        header.extend_from_slice(&self.num_data.to_le_bytes());
        header.extend_from_slice(&self.num_class.to_le_bytes());
        header.extend_from_slice(&(self.features.len() as i32).to_le_bytes());
        header.extend_from_slice(&self.num_total_features.to_le_bytes());
        header.extend_from_slice(&(self.used_feature_map.len() as u64).to_le_bytes());
        for &m in &self.used_feature_map {
            header.extend_from_slice(&m.to_le_bytes());
        }
        for name in &self.feature_names {
            header.extend_from_slice(&(name.len() as i32).to_le_bytes());
            header.extend_from_slice(name.as_bytes());
        }
        out.extend_from_slice(&(header.len() as u64).to_le_bytes());
        out.extend_from_slice(&header);

        out.extend_from_slice(&(self.metadata.sizes_in_byte() as u64).to_le_bytes());
        self.metadata.write_to(&mut out);

        for feature in &self.features {
            out.extend_from_slice(&(feature.sizes_in_byte() as u64).to_le_bytes());
            feature.write_to(&mut out);
        }

        let mut file = std::fs::File::create(&path)?;
        file.write_all(&out)?;
        Log::info(&format!("saved dataset to binary file {}", path));
        Ok(path)
    }

    /// Reads a binary dataset file written by [`Dataset::save_binary_file`].
    pub fn load_from_binary(path: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut bytes)?;
        let mut cursor = Cursor::new(&bytes);

        let header_len = cursor.read_u64()? as usize;
        let header_end = cursor.pos + header_len;
        let num_data = cursor.read_i32()?;
        let num_class = cursor.read_i32()?;
        let num_features = cursor.read_i32()?;
        let num_total_features = cursor.read_i32()?;
        let map_len = cursor.read_u64()? as usize;
        let mut used_feature_map = Vec::with_capacity(map_len);
        for _ in 0..map_len {
            used_feature_map.push(cursor.read_i32()?);
        }
        let mut feature_names = Vec::with_capacity(num_total_features.max(0) as usize);
        for _ in 0..num_total_features {
            let len = cursor.read_i32()? as usize;
            feature_names.push(
                String::from_utf8(cursor.read_bytes(len)?.to_vec())
                    .map_err(|_| BoostError::serialization("feature name is not utf-8"))?,
            );
        }
        if cursor.pos != header_end {
            return Err(BoostError::serialization(
                "binary dataset header size mismatch",
            ));
        }

        let meta_len = cursor.read_u64()? as usize;
        let metadata = Metadata::from_bytes(cursor.read_bytes(meta_len)?, num_class)?;

        let mut features = Vec::with_capacity(num_features.max(0) as usize);
        for _ in 0..num_features {
            let blob_len = cursor.read_u64()? as usize;
            features.push(Feature::from_bytes(cursor.read_bytes(blob_len)?, num_data)?);
        }

        Log::info(&format!(
            "loaded binary dataset {} ({} rows, {} used features)",
            path, num_data, num_features
        ));
        Ok(Dataset {
            data_filename: path.trim_end_matches(".bin").to_string(),
            num_data,
            num_class,
            num_total_features,
            used_feature_map,
            features,
            feature_names,
            label_idx: 0,
            metadata,
        })
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.bytes.len() {
            return Err(BoostError::serialization("binary dataset file truncated"));
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("num_data", &self.num_data)
            .field("num_features", &self.features.len())
            .field("num_total_features", &self.num_total_features)
            .field("num_class", &self.num_class)
            .finish()
    }
}
