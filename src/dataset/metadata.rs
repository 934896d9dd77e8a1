//! Non-feature data of a dataset: label, optional weights, query
//! boundaries and initial scores.

use crate::core::error::{BoostError, Result};
use crate::core::types::{DataSize, Label};
use crate::core::utils::threading::check_len;

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    num_data: DataSize,
    num_class: i32,
    label: Vec<Label>,
    /// Empty means unweighted.
    weights: Vec<Label>,
    /// Empty means no queries; otherwise `num_queries + 1` entries,
    /// strictly increasing, first 0 and last `num_data`.
    query_boundaries: Vec<DataSize>,
    /// Per-query weights, derived when both weights and queries exist.
    query_weights: Vec<Label>,
    /// Empty or `num_data * num_class` values, class-major.
    init_score: Vec<f64>,
}

impl Metadata {
    pub fn new(num_data: DataSize, num_class: i32) -> Self {
        Metadata {
            num_data,
            num_class,
            label: vec![0.0; num_data as usize],
            weights: Vec::new(),
            query_boundaries: Vec::new(),
            query_weights: Vec::new(),
            init_score: Vec::new(),
        }
    }

    pub fn num_data(&self) -> DataSize {
        self.num_data
    }

    pub fn set_label_at(&mut self, idx: DataSize, value: Label) {
        self.label[idx as usize] = value;
    }

    pub fn set_label(&mut self, label: Vec<Label>) -> Result<()> {
        check_len(label.len(), self.num_data, "label")?;
        self.label = label;
        Ok(())
    }

    /// Labels must be finite; a NaN label is unrecoverable.
    pub fn check_labels(&self) -> Result<()> {
        for (i, &l) in self.label.iter().enumerate() {
            if l.is_nan() {
                return Err(BoostError::numerical(format!("NaN label at row {}", i)));
            }
        }
        Ok(())
    }

    pub fn set_weights(&mut self, weights: Vec<Label>) -> Result<()> {
        if !weights.is_empty() {
            check_len(weights.len(), self.num_data, "weight")?;
        }
        self.weights = weights;
        self.update_query_weights();
        Ok(())
    }

    pub fn set_query_boundaries(&mut self, boundaries: Vec<DataSize>) -> Result<()> {
        if !boundaries.is_empty() {
            if boundaries.first() != Some(&0) || boundaries.last() != Some(&self.num_data) {
                return Err(BoostError::dataset(format!(
                    "query boundaries must start at 0 and end at {}",
                    self.num_data
                )));
            }
            for w in boundaries.windows(2) {
                if w[0] >= w[1] {
                    return Err(BoostError::dataset(
                        "query boundaries must be strictly increasing",
                    ));
                }
            }
        }
        self.query_boundaries = boundaries;
        self.update_query_weights();
        Ok(())
    }

    /// Builds boundaries from one query id per row; rows of one query
    /// must be consecutive.
    pub fn set_query_ids(&mut self, ids: &[DataSize]) -> Result<()> {
        check_len(ids.len(), self.num_data, "query id")?;
        let mut boundaries = vec![0];
        for i in 1..ids.len() {
            if ids[i] != ids[i - 1] {
                boundaries.push(i as DataSize);
            }
        }
        boundaries.push(self.num_data);
        self.set_query_boundaries(boundaries)
    }

    /// Builds boundaries from per-query row counts (the `.query` file
    /// shape).
    pub fn set_query_counts(&mut self, counts: &[DataSize]) -> Result<()> {
        let mut boundaries = vec![0];
        let mut acc = 0;
        for &c in counts {
            if c <= 0 {
                return Err(BoostError::dataset("query counts must be positive"));
            }
            acc += c;
            boundaries.push(acc);
        }
        if acc != self.num_data {
            return Err(BoostError::dataset(format!(
                "query counts sum to {} but the dataset has {} rows",
                acc, self.num_data
            )));
        }
        self.set_query_boundaries(boundaries)
    }

    pub fn set_init_score(&mut self, init_score: Vec<f64>) -> Result<()> {
        if !init_score.is_empty() && init_score.len() != (self.num_data as usize) * self.num_class as usize
        {
            return Err(BoostError::dataset(format!(
                "init score size {} does not match num_data {} * num_class {}",
                init_score.len(),
                self.num_data,
                self.num_class
            )));
        }
        self.init_score = init_score;
        Ok(())
    }

    fn update_query_weights(&mut self) {
        self.query_weights.clear();
        if self.weights.is_empty() || self.query_boundaries.is_empty() {
            return;
        }
        let num_queries = self.query_boundaries.len() - 1;
        self.query_weights.reserve(num_queries);
        for q in 0..num_queries {
            let begin = self.query_boundaries[q] as usize;
            let end = self.query_boundaries[q + 1] as usize;
            let sum: f64 = self.weights[begin..end].iter().map(|&w| w as f64).sum();
            self.query_weights.push((sum / (end - begin) as f64) as Label);
        }
    }

    pub fn label(&self) -> &[Label] {
        &self.label
    }

    pub fn weights(&self) -> Option<&[Label]> {
        if self.weights.is_empty() {
            None
        } else {
            Some(&self.weights)
        }
    }

    pub fn query_boundaries(&self) -> Option<&[DataSize]> {
        if self.query_boundaries.is_empty() {
            None
        } else {
            Some(&self.query_boundaries)
        }
    }

    pub fn num_queries(&self) -> DataSize {
        if self.query_boundaries.is_empty() {
            0
        } else {
            (self.query_boundaries.len() - 1) as DataSize
        }
    }

    pub fn query_weights(&self) -> Option<&[Label]> {
        if self.query_weights.is_empty() {
            None
        } else {
            Some(&self.query_weights)
        }
    }

    pub fn init_score(&self) -> Option<&[f64]> {
        if self.init_score.is_empty() {
            None
        } else {
            Some(&self.init_score)
        }
    }

    /// Metadata blob: `i32 num_data, num_weights, num_queries;
    /// f32 label[]; f32 weight[]?; i32 query_boundaries[num_queries+1]?`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.num_data.to_le_bytes());
        out.extend_from_slice(&(self.weights.len() as i32).to_le_bytes());
        out.extend_from_slice(&(self.num_queries()).to_le_bytes());
        for &l in &self.label {
            out.extend_from_slice(&l.to_le_bytes());
        }
        for &w in &self.weights {
            out.extend_from_slice(&w.to_le_bytes());
        }
        for &q in &self.query_boundaries {
            out.extend_from_slice(&q.to_le_bytes());
        }
    }

    pub fn sizes_in_byte(&self) -> usize {
        12 + 4 * self.label.len() + 4 * self.weights.len() + 4 * self.query_boundaries.len()
    }

    pub fn from_bytes(bytes: &[u8], num_class: i32) -> Result<Self> {
        if bytes.len() < 12 {
            return Err(BoostError::serialization("metadata blob truncated"));
        }
        let num_data = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let num_weights = i32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let num_queries = i32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let boundary_len = if num_queries > 0 { num_queries as usize + 1 } else { 0 };
        let need = 12
            + 4 * num_data as usize
            + 4 * num_weights as usize
            + 4 * boundary_len;
        if bytes.len() < need {
            return Err(BoostError::serialization(format!(
                "metadata blob truncated: need {} bytes, have {}",
                need,
                bytes.len()
            )));
        }
        let mut offset = 12;
        let read_f32 = |n: usize, offset: &mut usize| -> Vec<f32> {
            let out = bytes[*offset..*offset + 4 * n]
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
                .collect();
            *offset += 4 * n;
            out
        };
        let label = read_f32(num_data as usize, &mut offset);
        let weights = read_f32(num_weights as usize, &mut offset);
        let query_boundaries: Vec<DataSize> = bytes[offset..offset + 4 * boundary_len]
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        let mut meta = Metadata::new(num_data, num_class);
        meta.set_label(label)?;
        meta.set_weights(weights)?;
        meta.set_query_boundaries(query_boundaries)?;
        Ok(meta)
    }
}
