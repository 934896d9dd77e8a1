//! NDCG at configurable positions.

use crate::core::error::{BoostError, Result};
use crate::core::types::{DataSize, Label, Score};
use crate::dataset::Metadata;
use rayon::prelude::*;

#[derive(Debug, Default)]
pub struct NdcgMetric {
    eval_at: Vec<usize>,
    label_gain: Vec<f64>,
    label: Vec<Label>,
    query_boundaries: Vec<DataSize>,
    query_weights: Option<Vec<Label>>,
}

impl NdcgMetric {
    pub fn new(eval_at: &[i32], label_gain: Vec<f64>) -> Self {
        NdcgMetric {
            eval_at: eval_at.iter().map(|&k| k.max(1) as usize).collect(),
            label_gain,
            ..Default::default()
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        self.label = metadata.label().to_vec();
        self.query_boundaries = metadata
            .query_boundaries()
            .ok_or_else(|| BoostError::dataset("ndcg needs query boundaries"))?
            .to_vec();
        self.query_weights = metadata.query_weights().map(|w| w.to_vec());
        let max_label = self.label.iter().cloned().fold(0.0f32, f32::max) as usize;
        if self.label_gain.len() <= max_label {
            return Err(BoostError::config(format!(
                "label_gain has {} entries but labels reach {}",
                self.label_gain.len(),
                max_label
            )));
        }
        Ok(())
    }

    /// Mean NDCG per `eval_at` position; queries without any relevant
    /// document count as perfectly ranked.
    pub fn eval(&self, scores: &[Score]) -> Vec<f64> {
        let num_queries = self.query_boundaries.len() - 1;
        let sums: Vec<(Vec<f64>, f64)> = (0..num_queries)
            .into_par_iter()
            .map(|q| {
                let begin = self.query_boundaries[q] as usize;
                let end = self.query_boundaries[q + 1] as usize;
                let weight = self
                    .query_weights
                    .as_ref()
                    .map(|w| w[q] as f64)
                    .unwrap_or(1.0);
                let ndcg = self.query_ndcg(&self.label[begin..end], &scores[begin..end]);
                (ndcg.into_iter().map(|v| v * weight).collect(), weight)
            })
            .collect();
        let total_weight: f64 = sums.iter().map(|(_, w)| w).sum();
        let mut out = vec![0.0; self.eval_at.len()];
        for (ndcg, _) in &sums {
            for (o, v) in out.iter_mut().zip(ndcg.iter()) {
                *o += v;
            }
        }
        for o in out.iter_mut() {
            *o /= total_weight;
        }
        out
    }

    fn query_ndcg(&self, labels: &[Label], scores: &[Score]) -> Vec<f64> {
        let cnt = labels.len();
        let mut by_score: Vec<usize> = (0..cnt).collect();
        by_score.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        let mut ideal_gains: Vec<f64> = labels
            .iter()
            .map(|&l| self.label_gain[l as usize])
            .collect();
        let actual_gains: Vec<f64> = by_score
            .iter()
            .map(|&i| self.label_gain[labels[i] as usize])
            .collect();
        ideal_gains.sort_unstable_by(|a, b| b.partial_cmp(a).unwrap());

        self.eval_at
            .iter()
            .map(|&k| {
                let dcg = dcg_at(&actual_gains, k);
                let max_dcg = dcg_at(&ideal_gains, k);
                if max_dcg > 0.0 {
                    dcg / max_dcg
                } else {
                    1.0
                }
            })
            .collect()
    }
}

fn dcg_at(gains: &[f64], k: usize) -> f64 {
    gains
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, g)| g / (2.0 + i as f64).log2())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains() -> Vec<f64> {
        (0..32).map(|i| (2f64).powi(i) - 1.0).collect()
    }

    fn meta(labels: Vec<f32>, boundaries: Vec<DataSize>) -> Metadata {
        let mut m = Metadata::new(labels.len() as DataSize, 1);
        m.set_label(labels).unwrap();
        m.set_query_boundaries(boundaries).unwrap();
        m
    }

    #[test]
    fn perfect_ranking_scores_one() {
        let mut metric = NdcgMetric::new(&[1, 3], gains());
        metric.init(&meta(vec![2.0, 1.0, 0.0], vec![0, 3])).unwrap();
        let out = metric.eval(&[3.0, 2.0, 1.0]);
        for v in out {
            assert!((v - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn inverted_ranking_scores_below_one() {
        let mut metric = NdcgMetric::new(&[3], gains());
        metric.init(&meta(vec![2.0, 1.0, 0.0], vec![0, 3])).unwrap();
        let out = metric.eval(&[1.0, 2.0, 3.0]);
        assert!(out[0] < 1.0 && out[0] > 0.0);
    }

    #[test]
    fn all_zero_labels_count_as_perfect() {
        let mut metric = NdcgMetric::new(&[2], gains());
        metric
            .init(&meta(vec![0.0, 0.0, 2.0, 0.0], vec![0, 2, 4]))
            .unwrap();
        let out = metric.eval(&[0.5, 0.2, 1.0, 0.0]);
        // first query has no relevance at all, second is ranked perfectly
        assert!((out[0] - 1.0).abs() < 1e-9);
    }
}
