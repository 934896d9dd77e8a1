//! Binary and multiclass classification objectives.

use crate::core::error::{BoostError, Result};
use crate::core::types::{DataSize, Label, Score};
use crate::core::utils::common::softmax;
use crate::dataset::Metadata;
use rayon::prelude::*;

/// Binary log loss over labels {0, 1}, internally mapped to -1/+1.
#[derive(Debug, Default)]
pub struct BinaryLogloss {
    num_data: DataSize,
    /// Labels as -1/+1.
    label_val: Vec<i8>,
    weights: Option<Vec<Label>>,
    sigmoid: f64,
    is_unbalance: bool,
    /// Per-class rebalancing weight, indexed by (label+1)/2.
    label_weights: [f64; 2],
}

impl BinaryLogloss {
    pub fn new(sigmoid: f64, is_unbalance: bool) -> Self {
        BinaryLogloss {
            sigmoid,
            is_unbalance,
            label_weights: [1.0, 1.0],
            ..Default::default()
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        self.num_data = metadata.num_data();
        self.weights = metadata.weights().map(|w| w.to_vec());
        self.label_val = Vec::with_capacity(self.num_data as usize);
        let mut cnt_positive: i64 = 0;
        let mut cnt_negative: i64 = 0;
        for (i, &l) in metadata.label().iter().enumerate() {
            if l == 0.0 {
                self.label_val.push(-1);
                cnt_negative += 1;
            } else if l == 1.0 {
                self.label_val.push(1);
                cnt_positive += 1;
            } else {
                return Err(BoostError::dataset(format!(
                    "binary objective needs labels in {{0, 1}}, found {} at row {}",
                    l, i
                )));
            }
        }
        self.label_weights = [1.0, 1.0];
        if self.is_unbalance && cnt_positive > 0 && cnt_negative > 0 {
            if cnt_positive > cnt_negative {
                self.label_weights[0] = cnt_positive as f64 / cnt_negative as f64;
            } else {
                self.label_weights[1] = cnt_negative as f64 / cnt_positive as f64;
            }
        }
        Ok(())
    }

    pub fn get_gradients(&self, scores: &[Score], gradients: &mut [Score], hessians: &mut [Score]) {
        let sigmoid = self.sigmoid;
        let label_weights = self.label_weights;
        gradients
            .par_iter_mut()
            .zip(hessians.par_iter_mut())
            .enumerate()
            .for_each(|(i, (g, h))| {
                let label = self.label_val[i] as f64;
                let response =
                    -2.0 * label * sigmoid / (1.0 + (2.0 * label * sigmoid * scores[i] as f64).exp());
                let abs_response = response.abs();
                let mut weight = label_weights[((self.label_val[i] + 1) / 2) as usize];
                if let Some(w) = &self.weights {
                    weight *= w[i] as f64;
                }
                *g = (response * weight) as Score;
                *h = (abs_response * (2.0 * sigmoid - abs_response) * weight) as Score;
            });
    }

    pub fn sigmoid(&self) -> f64 {
        self.sigmoid
    }

    /// Probability transform used at prediction time.
    pub fn convert_output(&self, output: &mut [f64]) {
        for v in output.iter_mut() {
            *v = 1.0 / (1.0 + (-2.0 * self.sigmoid * *v).exp());
        }
    }
}

/// Multiclass softmax; trains `num_class` trees per iteration against
/// class-major scores (`scores[c * num_data + i]`).
#[derive(Debug, Default)]
pub struct MulticlassSoftmax {
    num_data: DataSize,
    num_class: i32,
    label_int: Vec<i32>,
    weights: Option<Vec<Label>>,
    is_empty_class: Vec<bool>,
    /// `k / (k - 1)` over non-empty classes.
    hessian_nor: f64,
    softmax_weight_decay: f64,
}

impl MulticlassSoftmax {
    pub fn new(num_class: i32) -> Self {
        MulticlassSoftmax {
            num_class,
            softmax_weight_decay: 1e-3,
            ..Default::default()
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        self.num_data = metadata.num_data();
        self.weights = metadata.weights().map(|w| w.to_vec());
        self.label_int = Vec::with_capacity(self.num_data as usize);
        let mut cnt_per_class = vec![0i64; self.num_class as usize];
        for (i, &l) in metadata.label().iter().enumerate() {
            let li = l as i32;
            if li < 0 || li >= self.num_class {
                return Err(BoostError::dataset(format!(
                    "label must be in [0, {}), found {} at row {}",
                    self.num_class, l, i
                )));
            }
            cnt_per_class[li as usize] += 1;
            self.label_int.push(li);
        }
        self.is_empty_class = cnt_per_class.iter().map(|&c| c == 0).collect();
        let mut non_empty = cnt_per_class.iter().filter(|&&c| c > 0).count();
        if non_empty < 2 {
            non_empty = 2;
        }
        self.hessian_nor = non_empty as f64 / (non_empty - 1) as f64;
        Ok(())
    }

    pub fn get_gradients(&self, scores: &[Score], gradients: &mut [Score], hessians: &mut [Score]) {
        let num_data = self.num_data as usize;
        let num_class = self.num_class as usize;
        // row-major probabilities first, then class-major gradients
        let mut probs = vec![0.0f64; num_data * num_class];
        probs
            .par_chunks_mut(num_class)
            .enumerate()
            .for_each(|(i, rec)| {
                for (k, r) in rec.iter_mut().enumerate() {
                    *r = scores[k * num_data + i] as f64;
                }
                softmax(rec);
            });
        for k in 0..num_class {
            let offset = k * num_data;
            let scores_k = &scores[offset..offset + num_data];
            let g_k = &mut gradients[offset..offset + num_data];
            let h_k = &mut hessians[offset..offset + num_data];
            if self.is_empty_class[k] {
                g_k.fill(0.0);
                h_k.fill(0.0);
                continue;
            }
            g_k.par_iter_mut()
                .zip(h_k.par_iter_mut())
                .enumerate()
                .for_each(|(i, (g, h))| {
                    let p = probs[i * num_class + k];
                    let weight = self.weights.as_ref().map(|w| w[i] as f64).unwrap_or(1.0);
                    let target = if self.label_int[i] == k as i32 { 1.0 } else { 0.0 };
                    *g = ((p - target + self.softmax_weight_decay * scores_k[i] as f64) * weight)
                        as Score;
                    *h = ((self.hessian_nor * p * (1.0 - p) + self.softmax_weight_decay) * weight)
                        as Score;
                });
        }
    }

    pub fn num_class(&self) -> i32 {
        self.num_class
    }

    pub fn convert_output(&self, output: &mut [f64]) {
        softmax(output);
    }
}

/// One-vs-all multiclass: an independent binary kernel per class.
#[derive(Debug, Default)]
pub struct MulticlassOva {
    num_data: DataSize,
    num_class: i32,
    sigmoid: f64,
    label_int: Vec<i32>,
    weights: Option<Vec<Label>>,
}

impl MulticlassOva {
    pub fn new(num_class: i32, sigmoid: f64) -> Self {
        MulticlassOva {
            num_class,
            sigmoid,
            ..Default::default()
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        self.num_data = metadata.num_data();
        self.weights = metadata.weights().map(|w| w.to_vec());
        self.label_int = Vec::with_capacity(self.num_data as usize);
        for (i, &l) in metadata.label().iter().enumerate() {
            let li = l as i32;
            if li < 0 || li >= self.num_class {
                return Err(BoostError::dataset(format!(
                    "label must be in [0, {}), found {} at row {}",
                    self.num_class, l, i
                )));
            }
            self.label_int.push(li);
        }
        Ok(())
    }

    pub fn get_gradients(&self, scores: &[Score], gradients: &mut [Score], hessians: &mut [Score]) {
        let num_data = self.num_data as usize;
        let sigmoid = self.sigmoid;
        for k in 0..self.num_class as usize {
            let offset = k * num_data;
            let scores_k = &scores[offset..offset + num_data];
            let (g_k, h_k) = (
                &mut gradients[offset..offset + num_data],
                &mut hessians[offset..offset + num_data],
            );
            g_k.par_iter_mut()
                .zip(h_k.par_iter_mut())
                .enumerate()
                .for_each(|(i, (g, h))| {
                    let label = if self.label_int[i] == k as i32 { 1.0 } else { -1.0 };
                    let response = -2.0 * label * sigmoid
                        / (1.0 + (2.0 * label * sigmoid * scores_k[i] as f64).exp());
                    let abs_response = response.abs();
                    let weight = self.weights.as_ref().map(|w| w[i] as f64).unwrap_or(1.0);
                    *g = (response * weight) as Score;
                    *h = (abs_response * (2.0 * sigmoid - abs_response) * weight) as Score;
                });
        }
    }

    pub fn num_class(&self) -> i32 {
        self.num_class
    }

    pub fn convert_output(&self, output: &mut [f64]) {
        for v in output.iter_mut() {
            *v = 1.0 / (1.0 + (-2.0 * self.sigmoid * *v).exp());
        }
    }
}
