//! Split candidate bookkeeping.

use crate::core::constants::K_MIN_SCORE;
use crate::core::types::{BinIndex, DataSize};

/// Best split found for one leaf (possibly invalid when no threshold
/// clears the constraints).
#[derive(Debug, Clone)]
pub struct SplitInfo {
    /// Used-feature index, -1 when no valid split exists.
    pub feature: i32,
    pub threshold: BinIndex,
    pub left_output: f64,
    pub right_output: f64,
    pub gain: f64,
    pub left_count: DataSize,
    pub right_count: DataSize,
    pub left_sum_gradient: f64,
    pub left_sum_hessian: f64,
    pub right_sum_gradient: f64,
    pub right_sum_hessian: f64,
    pub default_left: bool,
}

impl SplitInfo {
    pub fn new() -> Self {
        SplitInfo {
            feature: -1,
            threshold: 0,
            left_output: 0.0,
            right_output: 0.0,
            gain: K_MIN_SCORE,
            left_count: 0,
            right_count: 0,
            left_sum_gradient: 0.0,
            left_sum_hessian: 0.0,
            right_sum_gradient: 0.0,
            right_sum_hessian: 0.0,
            default_left: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.feature >= 0
    }

    /// Strict ordering used everywhere a best split is chosen: larger
    /// gain wins; equal gains keep the smaller feature index, then the
    /// smaller threshold, so results do not depend on evaluation order.
    pub fn is_better_than(&self, other: &SplitInfo) -> bool {
        if self.feature < 0 {
            return false;
        }
        if other.feature < 0 {
            return true;
        }
        if self.gain != other.gain {
            return self.gain > other.gain;
        }
        if self.feature != other.feature {
            return self.feature < other.feature;
        }
        self.threshold < other.threshold
    }

    /// Fixed wire size for the distributed argmax reduction.
    pub const SERIALIZED_SIZE: usize = 4 + 4 + 4 + 4 + 8 * 7 + 1;

    pub fn to_bytes(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.feature.to_le_bytes());
        out[4..8].copy_from_slice(&self.threshold.to_le_bytes());
        out[8..12].copy_from_slice(&self.left_count.to_le_bytes());
        out[12..16].copy_from_slice(&self.right_count.to_le_bytes());
        out[16..24].copy_from_slice(&self.gain.to_le_bytes());
        out[24..32].copy_from_slice(&self.left_output.to_le_bytes());
        out[32..40].copy_from_slice(&self.right_output.to_le_bytes());
        out[40..48].copy_from_slice(&self.left_sum_gradient.to_le_bytes());
        out[48..56].copy_from_slice(&self.left_sum_hessian.to_le_bytes());
        out[56..64].copy_from_slice(&self.right_sum_gradient.to_le_bytes());
        out[64..72].copy_from_slice(&self.right_sum_hessian.to_le_bytes());
        out[72] = self.default_left as u8;
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let f64_at = |o: usize| f64::from_le_bytes(bytes[o..o + 8].try_into().unwrap());
        SplitInfo {
            feature: i32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            threshold: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            left_count: i32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            right_count: i32::from_le_bytes(bytes[12..16].try_into().unwrap()),
            gain: f64_at(16),
            left_output: f64_at(24),
            right_output: f64_at(32),
            left_sum_gradient: f64_at(40),
            left_sum_hessian: f64_at(48),
            right_sum_gradient: f64_at(56),
            right_sum_hessian: f64_at(64),
            default_left: bytes[72] != 0,
        }
    }
}

impl Default for SplitInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_breaks_ties_by_feature_then_threshold() {
        let mut a = SplitInfo::new();
        a.feature = 2;
        a.threshold = 5;
        a.gain = 1.0;
        let mut b = a.clone();
        b.feature = 1;
        assert!(b.is_better_than(&a));
        let mut c = a.clone();
        c.threshold = 3;
        assert!(c.is_better_than(&a));
        let mut d = a.clone();
        d.gain = 2.0;
        d.feature = 9;
        assert!(d.is_better_than(&a));
        assert!(!SplitInfo::new().is_better_than(&a));
        assert!(a.is_better_than(&SplitInfo::new()));
    }

    #[test]
    fn byte_roundtrip() {
        let mut info = SplitInfo::new();
        info.feature = 7;
        info.threshold = 42;
        info.gain = 3.25;
        info.left_count = 10;
        info.right_count = 20;
        info.left_output = -0.5;
        info.right_output = 0.25;
        info.left_sum_gradient = 1.5;
        info.left_sum_hessian = 2.5;
        info.right_sum_gradient = -1.0;
        info.right_sum_hessian = 4.0;
        info.default_left = false;
        let mut buf = vec![0u8; SplitInfo::SERIALIZED_SIZE];
        info.to_bytes(&mut buf);
        let back = SplitInfo::from_bytes(&buf);
        assert_eq!(back.feature, 7);
        assert_eq!(back.threshold, 42);
        assert_eq!(back.gain, 3.25);
        assert_eq!(back.right_sum_hessian, 4.0);
        assert!(!back.default_left);
    }
}
