//! Per-(leaf, feature) histogram and the best-threshold scan over it.

use crate::config::TreeConfig;
use crate::core::types::{BinIndex, DataSize, Hist};
use crate::io::bin::HistogramBinEntry;
use crate::treelearner::split_info::SplitInfo;

/// Leaf output under L2 regularisation: `-sum_g / (sum_h + lambda)`.
pub fn calculate_leaf_output(sum_gradients: f64, sum_hessians: f64, lambda_l2: f64) -> f64 {
    if sum_hessians + lambda_l2 <= 0.0 {
        return 0.0;
    }
    -sum_gradients / (sum_hessians + lambda_l2)
}

fn leaf_gain_term(sum_gradients: f64, sum_hessians: f64, lambda_l2: f64) -> f64 {
    if sum_hessians + lambda_l2 <= 0.0 {
        return 0.0;
    }
    sum_gradients * sum_gradients / (sum_hessians + lambda_l2)
}

/// Histogram of one feature over one leaf.
#[derive(Debug, Clone)]
pub struct FeatureHistogram {
    data: Vec<HistogramBinEntry>,
}

impl FeatureHistogram {
    pub fn new(num_bin: i32) -> Self {
        FeatureHistogram {
            data: vec![HistogramBinEntry::default(); num_bin as usize],
        }
    }

    pub fn num_bin(&self) -> i32 {
        self.data.len() as i32
    }

    pub fn data(&self) -> &[HistogramBinEntry] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [HistogramBinEntry] {
        &mut self.data
    }

    pub fn reset(&mut self) {
        self.data.fill(HistogramBinEntry::default());
    }

    /// The subtraction trick: this histogram becomes parent minus
    /// sibling.
    pub fn subtract(&mut self, sibling: &FeatureHistogram) {
        for (e, s) in self.data.iter_mut().zip(sibling.data.iter()) {
            e.subtract(s);
        }
    }

    /// Reconstructs the default-bin entry of an ordered-bin feature from
    /// the leaf totals (ordered bins never store default entries).
    pub fn fix_default_bin(
        &mut self,
        default_bin: BinIndex,
        sum_gradients: f64,
        sum_hessians: f64,
        num_data: DataSize,
    ) {
        let mut other_g: Hist = 0.0;
        let mut other_h: Hist = 0.0;
        let mut other_cnt: u32 = 0;
        for (bin, entry) in self.data.iter().enumerate() {
            if bin as BinIndex != default_bin {
                other_g += entry.sum_gradients;
                other_h += entry.sum_hessians;
                other_cnt += entry.cnt;
            }
        }
        let entry = &mut self.data[default_bin as usize];
        entry.sum_gradients = sum_gradients - other_g;
        entry.sum_hessians = sum_hessians - other_h;
        entry.cnt = (num_data as u32).saturating_sub(other_cnt);
    }

    /// Scans thresholds `t in [0, num_bin-1)` with left prefix sums and
    /// returns the best valid split of this feature for the leaf.
    pub fn find_best_threshold(
        &self,
        feature: i32,
        default_bin: BinIndex,
        sum_gradients: f64,
        sum_hessians: f64,
        num_data: DataSize,
        config: &TreeConfig,
    ) -> SplitInfo {
        let mut best = SplitInfo::new();
        let lambda = config.lambda_l2;
        let gain_shift = leaf_gain_term(sum_gradients, sum_hessians, lambda);

        let mut left_g = 0.0f64;
        let mut left_h = 0.0f64;
        let mut left_cnt: DataSize = 0;
        let num_bin = self.data.len();
        for t in 0..num_bin.saturating_sub(1) {
            let entry = &self.data[t];
            left_g += entry.sum_gradients;
            left_h += entry.sum_hessians;
            left_cnt += entry.cnt as DataSize;

            if left_cnt < config.min_data_in_leaf || left_h < config.min_sum_hessian_in_leaf {
                continue;
            }
            let right_cnt = num_data - left_cnt;
            let right_h = sum_hessians - left_h;
            // the right side only shrinks from here on
            if right_cnt < config.min_data_in_leaf || right_h < config.min_sum_hessian_in_leaf {
                break;
            }
            let right_g = sum_gradients - left_g;
            let gain = leaf_gain_term(left_g, left_h, lambda) + leaf_gain_term(right_g, right_h, lambda)
                - gain_shift
                - config.min_gain_to_split;
            if gain > best.gain {
                best.feature = feature;
                best.threshold = t as BinIndex;
                best.gain = gain;
                best.left_count = left_cnt;
                best.right_count = right_cnt;
                best.left_sum_gradient = left_g;
                best.left_sum_hessian = left_h;
                best.right_sum_gradient = right_g;
                best.right_sum_hessian = right_h;
                best.left_output = calculate_leaf_output(left_g, left_h, lambda);
                best.right_output = calculate_leaf_output(right_g, right_h, lambda);
                best.default_left = default_bin <= t as BinIndex;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TreeConfig {
        TreeConfig {
            min_data_in_leaf: 1,
            min_sum_hessian_in_leaf: 0.0,
            ..TreeConfig::default()
        }
    }

    fn hist_from(entries: &[(f64, f64, u32)]) -> FeatureHistogram {
        let mut h = FeatureHistogram::new(entries.len() as i32);
        for (i, &(g, hh, c)) in entries.iter().enumerate() {
            h.data_mut()[i] = HistogramBinEntry {
                sum_gradients: g,
                sum_hessians: hh,
                cnt: c,
            };
        }
        h
    }

    #[test]
    fn finds_the_obvious_cut() {
        // gradients pull left bins down, right bins up
        let hist = hist_from(&[(-4.0, 2.0, 2), (-4.0, 2.0, 2), (4.0, 2.0, 2), (4.0, 2.0, 2)]);
        let info = hist.find_best_threshold(0, 0, 0.0, 8.0, 8, &config());
        assert!(info.is_valid());
        assert_eq!(info.threshold, 1);
        assert_eq!(info.left_count, 4);
        assert!(info.left_output > 0.0);
        assert!(info.right_output < 0.0);
        assert!(info.gain > 0.0);
    }

    #[test]
    fn min_data_in_leaf_filters_thresholds() {
        let hist = hist_from(&[(-1.0, 1.0, 1), (0.0, 1.0, 1), (1.0, 2.0, 2)]);
        let mut cfg = config();
        cfg.min_data_in_leaf = 2;
        let info = hist.find_best_threshold(0, 0, 0.0, 4.0, 4, &cfg);
        // only threshold 1 leaves two rows on both sides
        if info.is_valid() {
            assert_eq!(info.threshold, 1);
        }
    }

    #[test]
    fn gain_decreases_with_more_regularisation() {
        let hist = hist_from(&[(-4.0, 2.0, 2), (-2.0, 2.0, 2), (2.0, 2.0, 2), (4.0, 2.0, 2)]);
        let mut lo = config();
        lo.lambda_l2 = 0.1;
        let mut hi = config();
        hi.lambda_l2 = 10.0;
        let g_lo = hist.find_best_threshold(0, 0, 0.0, 8.0, 8, &lo).gain;
        let g_hi = hist.find_best_threshold(0, 0, 0.0, 8.0, 8, &hi).gain;
        assert!(g_hi <= g_lo);
    }

    #[test]
    fn subtraction_recovers_sibling() {
        let parent = hist_from(&[(1.0, 2.0, 3), (4.0, 5.0, 6), (7.0, 8.0, 9)]);
        let smaller = hist_from(&[(0.5, 1.0, 1), (2.0, 2.0, 3), (3.0, 4.0, 4)]);
        let mut larger = parent.clone();
        larger.subtract(&smaller);
        for (p, (s, l)) in parent
            .data()
            .iter()
            .zip(smaller.data().iter().zip(larger.data().iter()))
        {
            assert!((l.sum_gradients + s.sum_gradients - p.sum_gradients).abs() < 1e-12);
            assert!((l.sum_hessians + s.sum_hessians - p.sum_hessians).abs() < 1e-12);
            assert_eq!(l.cnt + s.cnt, p.cnt);
        }
    }

    #[test]
    fn fix_default_bin_restores_totals() {
        let mut hist = hist_from(&[(0.0, 0.0, 0), (2.0, 1.0, 2), (3.0, 1.0, 3)]);
        hist.fix_default_bin(0, 10.0, 4.0, 10);
        let e = &hist.data()[0];
        assert_eq!(e.sum_gradients, 5.0);
        assert_eq!(e.sum_hessians, 2.0);
        assert_eq!(e.cnt, 5);
    }
}
