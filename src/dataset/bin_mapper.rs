//! Per-feature discretisation: raw value to bin index.
//!
//! A mapper is built once from a sample of the feature's non-zero values
//! and is immutable afterwards. Validation datasets reuse the training
//! dataset's mappers so bin indices line up across datasets.

use crate::core::error::{BoostError, Result};
use crate::core::types::BinIndex;
use serde::{Deserialize, Serialize};

/// Values inside `[-K_ZERO_BOUND, K_ZERO_BOUND]` count as zero when
/// sampling for bin construction.
pub const K_ZERO_BOUND: f64 = 1e-35;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinMapper {
    num_bin: i32,
    /// Monotonically increasing; the last entry is +inf.
    bin_upper_bound: Vec<f64>,
    is_trivial: bool,
    /// Bin that zero (and missing) maps to.
    default_bin: BinIndex,
    /// Fraction of the sample in the default bin.
    sparse_rate: f64,
}

impl BinMapper {
    /// Mapper of a trivial (single-valued) feature.
    pub fn trivial() -> Self {
        BinMapper {
            num_bin: 1,
            bin_upper_bound: vec![f64::INFINITY],
            is_trivial: true,
            default_bin: 0,
            sparse_rate: 1.0,
        }
    }

    /// Builds bin boundaries from sampled non-zero values.
    ///
    /// `total_sample_cnt` is the number of sampled rows; rows whose value
    /// was not collected count as zeros. Distinct-value count at or below
    /// `max_bin` gives midpoint boundaries; above it, equal-frequency
    /// groups that never split a tie. The boundary straddling zero is
    /// pinned to 0.0 so zero lands in one bin deterministically.
    pub fn find_bin(sample_values: &[f64], total_sample_cnt: usize, max_bin: i32) -> Self {
        let mut values: Vec<f64> = sample_values
            .iter()
            .copied()
            .filter(|v| !v.is_nan() && v.abs() > K_ZERO_BOUND)
            .collect();
        values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());

        let zero_cnt = total_sample_cnt.saturating_sub(values.len());

        // collapse to (distinct value, count), zero inserted in order
        let mut distinct: Vec<f64> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        let mut zero_inserted = zero_cnt == 0;
        for &v in &values {
            if !zero_inserted && v > 0.0 {
                distinct.push(0.0);
                counts.push(zero_cnt);
                zero_inserted = true;
            }
            if let Some(&last) = distinct.last() {
                if v == last {
                    *counts.last_mut().unwrap() += 1;
                    continue;
                }
            }
            distinct.push(v);
            counts.push(1);
        }
        if !zero_inserted {
            distinct.push(0.0);
            counts.push(zero_cnt);
        }

        if distinct.len() < 2 {
            return BinMapper::trivial();
        }

        let total: usize = counts.iter().sum();
        let bounds = if distinct.len() as i32 <= max_bin {
            let mut bounds: Vec<f64> = distinct
                .windows(2)
                .map(|w| boundary_between(w[0], w[1]))
                .collect();
            bounds.push(f64::INFINITY);
            bounds
        } else {
            // equal-frequency groups; a distinct value never straddles a
            // boundary, so heavy ties simply make a heavier bin
            let mut bounds = Vec::new();
            let mut rest_cnt = total as f64;
            let mut rest_bins = max_bin;
            let mut cur = 0usize;
            for i in 0..distinct.len() {
                cur += counts[i];
                if i + 1 < distinct.len() && rest_bins > 1 && cur as f64 >= rest_cnt / rest_bins as f64
                {
                    bounds.push(boundary_between(distinct[i], distinct[i + 1]));
                    rest_cnt -= cur as f64;
                    cur = 0;
                    rest_bins -= 1;
                }
            }
            bounds.push(f64::INFINITY);
            bounds
        };

        let mut mapper = BinMapper {
            num_bin: bounds.len() as i32,
            bin_upper_bound: bounds,
            is_trivial: false,
            default_bin: 0,
            sparse_rate: 0.0,
        };
        if mapper.num_bin < 2 {
            return BinMapper::trivial();
        }
        mapper.default_bin = mapper.value_to_bin(0.0);
        let default_cnt: usize = distinct
            .iter()
            .zip(&counts)
            .filter(|&(&v, _)| mapper.value_to_bin(v) == mapper.default_bin)
            .map(|(_, &c)| c)
            .sum();
        mapper.sparse_rate = if total > 0 {
            default_cnt as f64 / total as f64
        } else {
            1.0
        };
        mapper
    }

    /// Rebuilds a mapper from stored boundaries (binary dataset load).
    pub fn from_boundaries(bin_upper_bound: Vec<f64>) -> Result<Self> {
        if bin_upper_bound.is_empty() {
            return Err(BoostError::serialization("bin mapper with no boundaries"));
        }
        for w in bin_upper_bound.windows(2) {
            if !(w[0] < w[1]) {
                return Err(BoostError::serialization(
                    "bin upper bounds are not strictly increasing",
                ));
            }
        }
        let is_trivial = bin_upper_bound.len() < 2;
        let mut mapper = BinMapper {
            num_bin: bin_upper_bound.len() as i32,
            bin_upper_bound,
            is_trivial,
            default_bin: 0,
            sparse_rate: 0.0,
        };
        mapper.default_bin = mapper.value_to_bin(0.0);
        Ok(mapper)
    }

    /// Smallest bin whose upper bound is at least `value`; NaN maps to
    /// the default bin.
    pub fn value_to_bin(&self, value: f64) -> BinIndex {
        if value.is_nan() {
            return self.default_bin;
        }
        let mut lo = 0usize;
        let mut hi = self.bin_upper_bound.len() - 1;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if value <= self.bin_upper_bound[mid] {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo as BinIndex
    }

    /// Real-valued threshold of a split at `bin`: its upper bound.
    pub fn bin_to_value(&self, bin: BinIndex) -> f64 {
        self.bin_upper_bound[bin as usize]
    }

    pub fn num_bin(&self) -> i32 {
        self.num_bin
    }

    pub fn is_trivial(&self) -> bool {
        self.is_trivial
    }

    pub fn default_bin(&self) -> BinIndex {
        self.default_bin
    }

    pub fn sparse_rate(&self) -> f64 {
        self.sparse_rate
    }

    pub fn bin_upper_bound(&self) -> &[f64] {
        &self.bin_upper_bound
    }
}

fn boundary_between(lo: f64, hi: f64) -> f64 {
    if lo <= 0.0 && hi > 0.0 {
        0.0
    } else {
        (lo + hi) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn few_distinct_values_get_singleton_bins() {
        let values = vec![1.0, 1.0, 2.0, 3.0, 3.0, 3.0];
        let mapper = BinMapper::find_bin(&values, values.len(), 255);
        // distinct values 1, 2, 3: one bin each
        assert!(!mapper.is_trivial());
        assert_eq!(mapper.value_to_bin(1.0), mapper.value_to_bin(0.9));
        assert_ne!(mapper.value_to_bin(1.0), mapper.value_to_bin(2.0));
        assert_ne!(mapper.value_to_bin(2.0), mapper.value_to_bin(3.0));
        assert_eq!(mapper.value_to_bin(100.0), (mapper.num_bin() - 1) as BinIndex);
    }

    #[test]
    fn bounds_are_strictly_increasing() {
        let values: Vec<f64> = (0..10_000).map(|i| ((i * 37) % 997) as f64 / 10.0).collect();
        let mapper = BinMapper::find_bin(&values, values.len(), 63);
        assert!(mapper.num_bin() <= 63);
        let bounds = mapper.bin_upper_bound();
        for w in bounds.windows(2) {
            assert!(w[0] < w[1]);
        }
        assert_eq!(*bounds.last().unwrap(), f64::INFINITY);
    }

    #[test]
    fn value_to_bin_is_monotone() {
        let values: Vec<f64> = (0..5000).map(|i| (i as f64).sin() * 100.0).collect();
        let mapper = BinMapper::find_bin(&values, values.len(), 31);
        let mut last = 0;
        let mut x = -150.0;
        while x <= 150.0 {
            let bin = mapper.value_to_bin(x);
            assert!(bin >= last);
            last = bin;
            x += 0.25;
        }
    }

    #[test]
    fn zero_maps_to_default_bin() {
        let values = vec![-5.0, -1.0, 2.0, 3.0, -2.0, 7.0];
        let mapper = BinMapper::find_bin(&values, 20, 255);
        assert_eq!(mapper.value_to_bin(0.0), mapper.default_bin());
        assert_eq!(mapper.value_to_bin(f64::NAN), mapper.default_bin());
        // negatives sit strictly below the default bin
        assert!(mapper.value_to_bin(-1.0) < mapper.default_bin());
        assert!(mapper.value_to_bin(2.0) > mapper.default_bin());
    }

    #[test]
    fn all_identical_values_are_trivial() {
        let values = vec![4.2; 100];
        // one distinct value and no zeros sampled: trivial
        let mapper = BinMapper::find_bin(&values, values.len(), 255);
        assert!(mapper.is_trivial());
        // zeros alongside one distinct value: two bins
        let mapper = BinMapper::find_bin(&values, 150, 255);
        assert!(!mapper.is_trivial());
        assert_eq!(mapper.num_bin(), 2);
        let empty: Vec<f64> = vec![];
        let mapper = BinMapper::find_bin(&empty, 100, 255);
        assert!(mapper.is_trivial());
    }

    #[test]
    fn sparse_rate_reflects_zero_share() {
        let values = vec![1.0, 2.0, 3.0];
        let mapper = BinMapper::find_bin(&values, 100, 255);
        assert!(mapper.sparse_rate() > 0.9);
        assert!(!mapper.is_trivial());
    }

    #[test]
    fn quantile_bins_respect_max_bin() {
        let values: Vec<f64> = (0..100_000).map(|i| (i % 1000) as f64 + 0.5).collect();
        let mapper = BinMapper::find_bin(&values, values.len(), 255);
        assert!(mapper.num_bin() <= 255);
        assert!(mapper.num_bin() >= 200);
    }
}
