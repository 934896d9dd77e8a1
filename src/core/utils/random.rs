/*!
 * Copyright (c) 2016 Microsoft Corporation. All rights reserved.
 * Licensed under the MIT License. See LICENSE file in the project root for license information.
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// A small deterministic random generator.
///
/// Uses a linear congruential step so that runs with the same seed sample
/// identical bagging sets, feature subsets and drop sets regardless of
/// platform.
#[derive(Debug, Clone)]
pub struct Random {
    x: u32,
}

impl Random {
    /// Constructor with an entropy-drawn seed.
    pub fn new() -> Self {
        let mut rng = StdRng::from_entropy();
        let seed: i32 = rng.gen_range(0..=65536);
        Random { x: seed as u32 }
    }

    /// Constructor with a specific seed.
    pub fn with_seed(seed: i32) -> Self {
        Random { x: seed as u32 }
    }

    /// Random integer in `[lower_bound, upper_bound)`, int16 range.
    pub fn next_short(&mut self, lower_bound: i32, upper_bound: i32) -> i32 {
        self.rand_int16() % (upper_bound - lower_bound) + lower_bound
    }

    /// Random integer in `[lower_bound, upper_bound)`, int32 range.
    pub fn next_int(&mut self, lower_bound: i32, upper_bound: i32) -> i32 {
        self.rand_int32() % (upper_bound - lower_bound) + lower_bound
    }

    /// Random float in `[0.0, 1.0)`.
    pub fn next_float(&mut self) -> f32 {
        (self.rand_int16() as f32) / 32768.0
    }

    /// Random double in `[0.0, 1.0)`.
    pub fn next_double(&mut self) -> f64 {
        (self.rand_int16() as f64) / 32768.0
    }

    /// Sample `k` values from `{0, 1, ..., n-1}`, returned in ascending
    /// order.
    pub fn sample(&mut self, n: i32, k: i32) -> Vec<i32> {
        let mut ret = Vec::new();
        if k > n || k <= 0 {
            return ret;
        } else if k == n {
            ret.extend(0..n);
        } else if k > 1 && (k as f64) > (n as f64 / (k as f64).log2()) {
            // selection sampling, one pass
            for i in 0..n {
                let prob = (k - ret.len() as i32) as f64 / (n - i) as f64;
                if (self.next_float() as f64) < prob {
                    ret.push(i);
                }
            }
        } else {
            // Floyd's algorithm for small k
            let mut sample_set = HashSet::new();
            for r in (n - k)..n {
                let v = self.next_int(0, r + 1);
                if !sample_set.insert(v) {
                    sample_set.insert(r);
                }
            }
            ret = sample_set.into_iter().collect();
            ret.sort_unstable();
        }
        ret
    }

    fn rand_int16(&mut self) -> i32 {
        self.x = self.x.wrapping_mul(214013).wrapping_add(2531011);
        ((self.x >> 16) & 0x7FFF) as i32
    }

    fn rand_int32(&mut self) -> i32 {
        self.x = self.x.wrapping_mul(214013).wrapping_add(2531011);
        (self.x & 0x7FFF_FFFF) as i32
    }
}

impl Default for Random {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Random::with_seed(123_456_789);
        let mut b = Random::with_seed(123_456_789);
        assert_eq!(a.next_int(0, 100), b.next_int(0, 100));
        assert_eq!(a.next_short(0, 1000), b.next_short(0, 1000));
        assert_eq!(a.next_float(), b.next_float());
        assert_eq!(a.sample(1000, 20), b.sample(1000, 20));
    }

    #[test]
    fn sample_bounds_and_order() {
        let mut rng = Random::with_seed(42);
        for &(n, k) in &[(10, 3), (100, 99), (50, 50), (7, 0)] {
            let s = rng.sample(n, k);
            assert!(s.len() <= k as usize);
            assert!(s.windows(2).all(|w| w[0] < w[1]));
            assert!(s.iter().all(|&v| v >= 0 && v < n));
        }
        assert!(rng.sample(0, 1).is_empty());
    }

    #[test]
    fn next_double_in_unit_interval() {
        let mut rng = Random::with_seed(7);
        for _ in 0..1000 {
            let v = rng.next_double();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
