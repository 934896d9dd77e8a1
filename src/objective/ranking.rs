//! Lambdarank pairwise ranking objective.
//!
//! For every in-query pair with different labels the better document
//! receives a negative lambda scaled by the pair's |delta NDCG|, the
//! worse one the mirror image. Queries whose labels are all equal have
//! no pairs and contribute nothing.

use crate::core::error::{BoostError, Result};
use crate::core::types::{DataSize, Label, Score};
use crate::dataset::Metadata;
use rayon::prelude::*;

#[derive(Debug, Default)]
pub struct Lambdarank {
    num_data: DataSize,
    sigmoid: f64,
    max_position: usize,
    label_gain: Vec<f64>,
    label: Vec<Label>,
    query_boundaries: Vec<DataSize>,
    query_weights: Option<Vec<Label>>,
    /// `1 / max_dcg` per query; 0 marks a query without signal.
    inverse_max_dcg: Vec<f64>,
}

impl Lambdarank {
    pub fn new(sigmoid: f64, max_position: i32, label_gain: Vec<f64>) -> Self {
        Lambdarank {
            sigmoid,
            max_position: max_position.max(1) as usize,
            label_gain,
            ..Default::default()
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        self.num_data = metadata.num_data();
        self.label = metadata.label().to_vec();
        self.query_boundaries = metadata
            .query_boundaries()
            .ok_or_else(|| {
                BoostError::dataset("lambdarank needs query boundaries (group column or .query file)")
            })?
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
        let num_queries = self.query_boundaries.len() - 1;
        self.inverse_max_dcg = (0..num_queries)
            .into_par_iter()
            .map(|q| {
                let begin = self.query_boundaries[q] as usize;
                let end = self.query_boundaries[q + 1] as usize;
                let mut gains: Vec<f64> = self.label[begin..end]
                    .iter()
                    .map(|&l| self.label_gain[l as usize])
                    .collect();
                gains.sort_unstable_by(|a, b| b.partial_cmp(a).unwrap());
                let max_dcg: f64 = gains
                    .iter()
                    .take(self.max_position)
                    .enumerate()
                    .map(|(i, g)| g * discount(i))
                    .sum();
                if max_dcg > 0.0 {
                    1.0 / max_dcg
                } else {
                    0.0
                }
            })
            .collect();
        Ok(())
    }

    pub fn get_gradients(&self, scores: &[Score], gradients: &mut [Score], hessians: &mut [Score]) {
        let num_queries = self.query_boundaries.len() - 1;
        // per-query slices of the gradient buffers
        let mut g_parts: Vec<&mut [Score]> = Vec::with_capacity(num_queries);
        let mut h_parts: Vec<&mut [Score]> = Vec::with_capacity(num_queries);
        {
            let mut g_rest: &mut [Score] = gradients;
            let mut h_rest: &mut [Score] = hessians;
            for q in 0..num_queries {
                let len =
                    (self.query_boundaries[q + 1] - self.query_boundaries[q]) as usize;
                let (g_part, g_next) = std::mem::take(&mut g_rest).split_at_mut(len);
                g_parts.push(g_part);
                g_rest = g_next;
                let (h_part, h_next) = std::mem::take(&mut h_rest).split_at_mut(len);
                h_parts.push(h_part);
                h_rest = h_next;
            }
        }
        g_parts
            .into_par_iter()
            .zip(h_parts.into_par_iter())
            .enumerate()
            .for_each(|(q, (g_q, h_q))| {
                self.get_gradients_for_one_query(q, scores, g_q, h_q);
            });
    }

    fn get_gradients_for_one_query(
        &self,
        query: usize,
        scores: &[Score],
        g_out: &mut [Score],
        h_out: &mut [Score],
    ) {
        let begin = self.query_boundaries[query] as usize;
        let cnt = g_out.len();
        g_out.fill(0.0);
        h_out.fill(0.0);
        let inverse_max_dcg = self.inverse_max_dcg[query];
        if inverse_max_dcg <= 0.0 {
            return;
        }
        let scores_q = &scores[begin..begin + cnt];
        let labels_q = &self.label[begin..begin + cnt];

        // rank documents by current score
        let mut sorted: Vec<usize> = (0..cnt).collect();
        sorted.sort_by(|&a, &b| {
            scores_q[b]
                .partial_cmp(&scores_q[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let sigma = self.sigmoid;
        for i in 0..cnt {
            for j in (i + 1)..cnt {
                let di = sorted[i];
                let dj = sorted[j];
                if labels_q[di] == labels_q[dj] {
                    continue;
                }
                let (high, low, rank_high, rank_low) = if labels_q[di] > labels_q[dj] {
                    (di, dj, i, j)
                } else {
                    (dj, di, i, j)
                };
                let gain_diff = self.label_gain[labels_q[high] as usize]
                    - self.label_gain[labels_q[low] as usize];
                let paired_discount =
                    (truncated_discount(rank_high, self.max_position)
                        - truncated_discount(rank_low, self.max_position))
                    .abs();
                let delta_ndcg = gain_diff.abs() * paired_discount * inverse_max_dcg;
                if delta_ndcg <= 0.0 {
                    continue;
                }
                let delta_score = (scores_q[high] - scores_q[low]) as f64;
                let p = 1.0 / (1.0 + (sigma * delta_score).exp());
                let lambda = sigma * p * delta_ndcg;
                let hess = sigma * sigma * p * (1.0 - p) * delta_ndcg;
                g_out[high] -= lambda as Score;
                g_out[low] += lambda as Score;
                h_out[high] += hess as Score;
                h_out[low] += hess as Score;
            }
        }
        if let Some(qw) = &self.query_weights {
            let w = qw[query];
            for (g, h) in g_out.iter_mut().zip(h_out.iter_mut()) {
                *g *= w;
                *h *= w;
            }
        }
    }
}

/// Position discount `1 / log2(2 + rank)`.
fn discount(rank: usize) -> f64 {
    1.0 / (2.0 + rank as f64).log2()
}

fn truncated_discount(rank: usize, max_position: usize) -> f64 {
    if rank < max_position {
        discount(rank)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_gains() -> Vec<f64> {
        (0..32).map(|i| (2f64).powi(i) - 1.0).collect()
    }

    fn meta_with_queries(labels: Vec<f32>, boundaries: Vec<DataSize>) -> Metadata {
        let mut meta = Metadata::new(labels.len() as DataSize, 1);
        meta.set_label(labels).unwrap();
        meta.set_query_boundaries(boundaries).unwrap();
        meta
    }

    #[test]
    fn needs_queries() {
        let mut meta = Metadata::new(4, 1);
        meta.set_label(vec![0.0; 4]).unwrap();
        let mut obj = Lambdarank::new(1.0, 20, default_gains());
        assert!(obj.init(&meta).is_err());
    }

    #[test]
    fn equal_label_query_contributes_zero() {
        let meta = meta_with_queries(vec![1.0, 1.0, 1.0, 0.0, 1.0, 2.0], vec![0, 3, 6]);
        let mut obj = Lambdarank::new(1.0, 20, default_gains());
        obj.init(&meta).unwrap();
        let scores = vec![0.5, 0.1, 0.2, 0.3, 0.2, 0.1];
        let mut g = vec![9.0f32; 6];
        let mut h = vec![9.0f32; 6];
        obj.get_gradients(&scores, &mut g, &mut h);
        assert_eq!(&g[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&h[..3], &[0.0, 0.0, 0.0]);
        // the mixed query produces signal
        assert!(g[3..].iter().any(|&v| v != 0.0));
    }

    #[test]
    fn better_documents_get_negative_lambdas() {
        let meta = meta_with_queries(vec![2.0, 0.0], vec![0, 2]);
        let mut obj = Lambdarank::new(1.0, 20, default_gains());
        obj.init(&meta).unwrap();
        let mut g = vec![0.0f32; 2];
        let mut h = vec![0.0f32; 2];
        // the relevant document is currently ranked below the irrelevant
        obj.get_gradients(&[-1.0, 1.0], &mut g, &mut h);
        assert!(g[0] < 0.0, "relevant doc should be pushed up");
        assert!(g[1] > 0.0);
        assert!((g[0] + g[1]).abs() < 1e-6);
        assert!(h[0] > 0.0 && h[1] > 0.0);
    }

    #[test]
    fn pairs_beyond_max_position_are_ignored() {
        // two documents, truncation at 1 keeps only the top slot
        let meta = meta_with_queries(vec![1.0, 0.0, 1.0, 0.0], vec![0, 2, 4]);
        let mut obj = Lambdarank::new(1.0, 1, default_gains());
        obj.init(&meta).unwrap();
        let mut g = vec![0.0f32; 4];
        let mut h = vec![0.0f32; 4];
        obj.get_gradients(&[1.0, 0.0, 0.0, 1.0], &mut g, &mut h);
        // pair discount differs only via the top position, still non-zero
        assert!(g.iter().any(|&v| v != 0.0));
    }
}
