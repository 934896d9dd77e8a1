//! Per-leaf gradient and hessian totals feeding the split search.

use crate::core::types::{DataSize, Score};
use crate::core::utils::threading::sum_over;

#[derive(Debug, Clone)]
pub struct LeafSplits {
    leaf_index: i32,
    num_data_in_leaf: DataSize,
    sum_gradients: f64,
    sum_hessians: f64,
}

impl LeafSplits {
    pub fn new() -> Self {
        LeafSplits {
            leaf_index: -1,
            num_data_in_leaf: 0,
            sum_gradients: 0.0,
            sum_hessians: 0.0,
        }
    }

    /// Root init over the full score vectors.
    pub fn init_all(&mut self, gradients: &[Score], hessians: &[Score]) {
        self.leaf_index = 0;
        self.num_data_in_leaf = gradients.len() as DataSize;
        let n = gradients.len() as DataSize;
        self.sum_gradients = sum_over(n, |i| gradients[i as usize] as f64);
        self.sum_hessians = sum_over(n, |i| hessians[i as usize] as f64);
    }

    /// Root init over a bagged row subset.
    pub fn init_with_indices(
        &mut self,
        indices: &[DataSize],
        gradients: &[Score],
        hessians: &[Score],
    ) {
        self.leaf_index = 0;
        self.num_data_in_leaf = indices.len() as DataSize;
        let n = indices.len() as DataSize;
        self.sum_gradients = sum_over(n, |i| gradients[indices[i as usize] as usize] as f64);
        self.sum_hessians = sum_over(n, |i| hessians[indices[i as usize] as usize] as f64);
    }

    /// Child init from the sums the split search already produced.
    pub fn init_with_sums(
        &mut self,
        leaf: i32,
        num_data_in_leaf: DataSize,
        sum_gradients: f64,
        sum_hessians: f64,
    ) {
        self.leaf_index = leaf;
        self.num_data_in_leaf = num_data_in_leaf;
        self.sum_gradients = sum_gradients;
        self.sum_hessians = sum_hessians;
    }

    pub fn init_empty(&mut self) {
        self.leaf_index = -1;
        self.num_data_in_leaf = 0;
        self.sum_gradients = 0.0;
        self.sum_hessians = 0.0;
    }

    pub fn leaf_index(&self) -> i32 {
        self.leaf_index
    }

    pub fn num_data_in_leaf(&self) -> DataSize {
        self.num_data_in_leaf
    }

    pub fn sum_gradients(&self) -> f64 {
        self.sum_gradients
    }

    pub fn sum_hessians(&self) -> f64 {
        self.sum_hessians
    }
}

impl Default for LeafSplits {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_all_sums_everything() {
        let g: Vec<Score> = (0..100).map(|i| i as Score).collect();
        let h = vec![0.5 as Score; 100];
        let mut ls = LeafSplits::new();
        ls.init_all(&g, &h);
        assert_eq!(ls.sum_gradients(), 4950.0);
        assert_eq!(ls.sum_hessians(), 50.0);
        assert_eq!(ls.num_data_in_leaf(), 100);
        assert_eq!(ls.leaf_index(), 0);
    }

    #[test]
    fn init_with_indices_restricts_to_bag() {
        let g: Vec<Score> = (0..10).map(|i| i as Score).collect();
        let h = vec![1.0 as Score; 10];
        let mut ls = LeafSplits::new();
        ls.init_with_indices(&[0, 2, 4], &g, &h);
        assert_eq!(ls.sum_gradients(), 6.0);
        assert_eq!(ls.sum_hessians(), 3.0);
        assert_eq!(ls.num_data_in_leaf(), 3);
    }
}
