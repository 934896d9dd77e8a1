//! L2 regression objective.

use crate::core::error::Result;
use crate::core::types::{DataSize, Label, Score};
use crate::dataset::Metadata;
use rayon::prelude::*;

/// Squared loss: gradient `score - label`, constant hessian.
#[derive(Debug, Default)]
pub struct RegressionL2 {
    num_data: DataSize,
    label: Vec<Label>,
    weights: Option<Vec<Label>>,
}

impl RegressionL2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        self.num_data = metadata.num_data();
        self.label = metadata.label().to_vec();
        self.weights = metadata.weights().map(|w| w.to_vec());
        Ok(())
    }

    pub fn get_gradients(&self, scores: &[Score], gradients: &mut [Score], hessians: &mut [Score]) {
        match &self.weights {
            None => {
                gradients
                    .par_iter_mut()
                    .zip(hessians.par_iter_mut())
                    .enumerate()
                    .for_each(|(i, (g, h))| {
                        *g = scores[i] - self.label[i];
                        *h = 1.0;
                    });
            }
            Some(weights) => {
                gradients
                    .par_iter_mut()
                    .zip(hessians.par_iter_mut())
                    .enumerate()
                    .for_each(|(i, (g, h))| {
                        *g = (scores[i] - self.label[i]) * weights[i];
                        *h = weights[i];
                    });
            }
        }
    }
}
