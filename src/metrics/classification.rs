//! Binary and multiclass classification metrics.

use crate::core::constants::K_SIGMOID_EPS;
use crate::core::error::{BoostError, Result};
use crate::core::types::{DataSize, Label, Score};
use crate::core::utils::common::softmax;
use crate::core::utils::threading::sum_over;
use crate::dataset::Metadata;
use crate::metrics::regression::copy_label_weights;

/// Binary log loss against raw scores: `log(1 + exp(-2 s y score))`.
#[derive(Debug, Default)]
pub struct BinaryLoglossMetric {
    label: Vec<Label>,
    weights: Option<Vec<Label>>,
    sum_weights: f64,
    sigmoid: f64,
}

impl BinaryLoglossMetric {
    pub fn new(sigmoid: f64) -> Self {
        BinaryLoglossMetric {
            sigmoid,
            ..Default::default()
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        let (label, weights, sum) = copy_label_weights(metadata);
        self.label = label;
        self.weights = weights;
        self.sum_weights = sum;
        Ok(())
    }

    pub fn eval(&self, scores: &[Score]) -> Vec<f64> {
        let sigmoid = self.sigmoid;
        let sum = sum_over(self.label.len() as DataSize, |i| {
            let i = i as usize;
            let y = if self.label[i] > 0.0 { 1.0 } else { -1.0 };
            let loss = (1.0 + (-2.0 * sigmoid * y * scores[i] as f64).exp()).ln();
            match &self.weights {
                Some(w) => loss * w[i] as f64,
                None => loss,
            }
        });
        vec![sum / self.sum_weights]
    }
}

/// Fraction of rows on the wrong side of the decision boundary.
#[derive(Debug, Default)]
pub struct BinaryErrorMetric {
    label: Vec<Label>,
    weights: Option<Vec<Label>>,
    sum_weights: f64,
}

impl BinaryErrorMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        let (label, weights, sum) = copy_label_weights(metadata);
        self.label = label;
        self.weights = weights;
        self.sum_weights = sum;
        Ok(())
    }

    pub fn eval(&self, scores: &[Score]) -> Vec<f64> {
        let sum = sum_over(self.label.len() as DataSize, |i| {
            let i = i as usize;
            let predicted_positive = scores[i] > 0.0;
            let is_positive = self.label[i] > 0.0;
            let err = if predicted_positive == is_positive { 0.0 } else { 1.0 };
            match &self.weights {
                Some(w) => err * w[i] as f64,
                None => err,
            }
        });
        vec![sum / self.sum_weights]
    }
}

/// Area under the ROC curve, weighted rank-sum formulation with tie
/// handling.
#[derive(Debug, Default)]
pub struct AucMetric {
    label: Vec<Label>,
    weights: Option<Vec<Label>>,
}

impl AucMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        self.label = metadata.label().to_vec();
        self.weights = metadata.weights().map(|w| w.to_vec());
        Ok(())
    }

    pub fn eval(&self, scores: &[Score]) -> Vec<f64> {
        let n = self.label.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            scores[a]
                .partial_cmp(&scores[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let weight_at = |i: usize| -> f64 {
            self.weights.as_ref().map(|w| w[i] as f64).unwrap_or(1.0)
        };
        let mut auc = 0.0f64;
        let mut cum_neg = 0.0f64;
        let mut total_pos = 0.0f64;
        let mut i = 0;
        while i < n {
            // one group of tied scores
            let mut group_pos = 0.0;
            let mut group_neg = 0.0;
            let score = scores[order[i]];
            while i < n && scores[order[i]] == score {
                let idx = order[i];
                if self.label[idx] > 0.0 {
                    group_pos += weight_at(idx);
                } else {
                    group_neg += weight_at(idx);
                }
                i += 1;
            }
            auc += group_pos * (cum_neg + 0.5 * group_neg);
            cum_neg += group_neg;
            total_pos += group_pos;
        }
        if total_pos > 0.0 && cum_neg > 0.0 {
            vec![auc / (total_pos * cum_neg)]
        } else {
            vec![1.0]
        }
    }
}

/// Multiclass negative log likelihood of the true class.
#[derive(Debug, Default)]
pub struct MultiLoglossMetric {
    label: Vec<Label>,
    weights: Option<Vec<Label>>,
    sum_weights: f64,
    num_class: i32,
}

impl MultiLoglossMetric {
    pub fn new(num_class: i32) -> Self {
        MultiLoglossMetric {
            num_class,
            ..Default::default()
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        if self.num_class < 2 {
            return Err(BoostError::config("multi_logloss needs num_class >= 2"));
        }
        let (label, weights, sum) = copy_label_weights(metadata);
        self.label = label;
        self.weights = weights;
        self.sum_weights = sum;
        Ok(())
    }

    pub fn eval(&self, scores: &[Score]) -> Vec<f64> {
        let num_data = self.label.len();
        let num_class = self.num_class as usize;
        let sum = sum_over(num_data as DataSize, |i| {
            let i = i as usize;
            let mut rec: Vec<f64> =
                (0..num_class).map(|k| scores[k * num_data + i] as f64).collect();
            softmax(&mut rec);
            let p = rec[self.label[i] as usize].max(K_SIGMOID_EPS);
            let loss = -p.ln();
            match &self.weights {
                Some(w) => loss * w[i] as f64,
                None => loss,
            }
        });
        vec![sum / self.sum_weights]
    }
}

/// Multiclass top-1 error rate.
#[derive(Debug, Default)]
pub struct MultiErrorMetric {
    label: Vec<Label>,
    weights: Option<Vec<Label>>,
    sum_weights: f64,
    num_class: i32,
}

impl MultiErrorMetric {
    pub fn new(num_class: i32) -> Self {
        MultiErrorMetric {
            num_class,
            ..Default::default()
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        if self.num_class < 2 {
            return Err(BoostError::config("multi_error needs num_class >= 2"));
        }
        let (label, weights, sum) = copy_label_weights(metadata);
        self.label = label;
        self.weights = weights;
        self.sum_weights = sum;
        Ok(())
    }

    pub fn eval(&self, scores: &[Score]) -> Vec<f64> {
        let num_data = self.label.len();
        let num_class = self.num_class as usize;
        let sum = sum_over(num_data as DataSize, |i| {
            let i = i as usize;
            let mut best = 0usize;
            for k in 1..num_class {
                if scores[k * num_data + i] > scores[best * num_data + i] {
                    best = k;
                }
            }
            let err = if best as i32 == self.label[i] as i32 { 0.0 } else { 1.0 };
            match &self.weights {
                Some(w) => err * w[i] as f64,
                None => err,
            }
        });
        vec![sum / self.sum_weights]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(labels: Vec<f32>) -> Metadata {
        let mut m = Metadata::new(labels.len() as DataSize, 1);
        m.set_label(labels).unwrap();
        m
    }

    #[test]
    fn logloss_at_zero_scores_is_ln2() {
        let mut metric = BinaryLoglossMetric::new(1.0);
        metric.init(&meta(vec![0.0, 1.0, 1.0, 0.0])).unwrap();
        let out = metric.eval(&[0.0; 4]);
        assert!((out[0] - (2f64).ln()).abs() < 1e-9);
    }

    #[test]
    fn error_counts_misclassified_rows() {
        let mut metric = BinaryErrorMetric::new();
        metric.init(&meta(vec![1.0, 0.0, 1.0, 0.0])).unwrap();
        let out = metric.eval(&[1.0, 1.0, -1.0, -1.0]);
        assert!((out[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn auc_of_a_perfect_ranking_is_one() {
        let mut metric = AucMetric::new();
        metric.init(&meta(vec![0.0, 0.0, 1.0, 1.0])).unwrap();
        assert!((metric.eval(&[-2.0, -1.0, 1.0, 2.0])[0] - 1.0).abs() < 1e-9);
        assert!((metric.eval(&[2.0, 1.0, -1.0, -2.0])[0]).abs() < 1e-9);
        // all tied scores sit at 0.5
        assert!((metric.eval(&[0.0; 4])[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn multi_error_uses_argmax() {
        let mut metric = MultiErrorMetric::new(3);
        metric.init(&meta(vec![0.0, 1.0])).unwrap();
        // class-major scores for 2 rows, 3 classes: row0 argmax=0, row1 argmax=2
        let scores = vec![5.0, 0.0, 1.0, 1.0, 0.0, 3.0];
        let out = metric.eval(&scores);
        assert!((out[0] - 0.5).abs() < 1e-9);
    }
}
