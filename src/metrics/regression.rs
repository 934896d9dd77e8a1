//! L1 and L2 regression metrics.

use crate::core::error::Result;
use crate::core::types::{DataSize, Label, Score};
use crate::core::utils::threading::sum_over;
use crate::dataset::Metadata;

#[derive(Debug, Default)]
pub struct L1Metric {
    label: Vec<Label>,
    weights: Option<Vec<Label>>,
    sum_weights: f64,
}

impl L1Metric {
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
            let err = (scores[i] - self.label[i]).abs() as f64;
            match &self.weights {
                Some(w) => err * w[i] as f64,
                None => err,
            }
        });
        vec![sum / self.sum_weights]
    }
}

#[derive(Debug, Default)]
pub struct L2Metric {
    label: Vec<Label>,
    weights: Option<Vec<Label>>,
    sum_weights: f64,
}

impl L2Metric {
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
            let diff = (scores[i] - self.label[i]) as f64;
            match &self.weights {
                Some(w) => diff * diff * w[i] as f64,
                None => diff * diff,
            }
        });
        vec![sum / self.sum_weights]
    }
}

pub(crate) fn copy_label_weights(metadata: &Metadata) -> (Vec<Label>, Option<Vec<Label>>, f64) {
    let label = metadata.label().to_vec();
    let weights = metadata.weights().map(|w| w.to_vec());
    let sum = match &weights {
        Some(w) => w.iter().map(|&v| v as f64).sum(),
        None => metadata.num_data() as f64,
    };
    (label, weights, sum)
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
    fn l2_is_mean_squared_error() {
        let mut metric = L2Metric::new();
        metric.init(&meta(vec![0.0, 1.0, 2.0])).unwrap();
        let out = metric.eval(&[0.0, 0.0, 0.0]);
        assert!((out[0] - 5.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn l1_is_mean_absolute_error() {
        let mut metric = L1Metric::new();
        metric.init(&meta(vec![1.0, -1.0])).unwrap();
        let out = metric.eval(&[0.0, 0.0]);
        assert!((out[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weights_shift_the_mean() {
        let mut m = meta(vec![0.0, 2.0]);
        m.set_weights(vec![3.0, 1.0]).unwrap();
        let mut metric = L2Metric::new();
        metric.init(&m).unwrap();
        let out = metric.eval(&[1.0, 1.0]);
        // (3*1 + 1*1) / 4
        assert!((out[0] - 1.0).abs() < 1e-9);
    }
}
