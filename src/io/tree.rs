//! Decision tree as a node table.
//!
//! Internal nodes are numbered `0..num_leaves-1`; children are internal
//! node indices when non-negative and `!leaf` when negative. A split
//! replaces a leaf with an internal node and two new leaves, so
//! `num_leaves == num_internal_nodes + 1` always holds.

use crate::core::error::{BoostError, Result};
use crate::core::types::{BinIndex, DataSize, Score};
use crate::core::utils::common;
use crate::dataset::dataset::Dataset;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision type bit: missing values and the default bin go left.
const MASK_DEFAULT_LEFT: i8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    max_leaves: i32,
    num_leaves: i32,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    /// Used-feature index of each split, for scoring binned training
    /// rows. -1 on trees restored from text.
    split_feature_inner: Vec<i32>,
    /// Raw column index of each split, for scoring raw rows.
    split_feature: Vec<i32>,
    threshold_in_bin: Vec<BinIndex>,
    /// Real-valued threshold: the upper bound of the split bin.
    threshold: Vec<f64>,
    decision_type: Vec<i8>,
    split_gain: Vec<f64>,
    internal_value: Vec<f64>,
    internal_count: Vec<DataSize>,
    leaf_value: Vec<f64>,
    leaf_count: Vec<DataSize>,
    leaf_parent: Vec<i32>,
}

impl Tree {
    /// A fresh single-leaf tree with room for `max_leaves` leaves.
    pub fn new(max_leaves: i32) -> Self {
        let internal = (max_leaves - 1).max(0) as usize;
        let leaves = max_leaves.max(1) as usize;
        Tree {
            max_leaves,
            num_leaves: 1,
            left_child: vec![0; internal],
            right_child: vec![0; internal],
            split_feature_inner: vec![-1; internal],
            split_feature: vec![-1; internal],
            threshold_in_bin: vec![0; internal],
            threshold: vec![0.0; internal],
            decision_type: vec![0; internal],
            split_gain: vec![0.0; internal],
            internal_value: vec![0.0; internal],
            internal_count: vec![0; internal],
            leaf_value: vec![0.0; leaves],
            leaf_count: vec![0; leaves],
            leaf_parent: vec![-1; leaves],
        }
    }

    pub fn num_leaves(&self) -> i32 {
        self.num_leaves
    }

    pub fn leaf_output(&self, leaf: i32) -> f64 {
        self.leaf_value[leaf as usize]
    }

    pub fn set_leaf_output(&mut self, leaf: i32, value: f64) {
        self.leaf_value[leaf as usize] = value;
    }

    pub fn split_feature_real(&self, node: i32) -> i32 {
        self.split_feature[node as usize]
    }

    /// Splits `leaf`; the right child becomes leaf `num_leaves`. Returns
    /// the index of the new internal node.
    #[allow(clippy::too_many_arguments)]
    pub fn split(
        &mut self,
        leaf: i32,
        feature_inner: i32,
        feature_real: i32,
        threshold_bin: BinIndex,
        threshold_double: f64,
        default_left: bool,
        left_value: f64,
        right_value: f64,
        left_cnt: DataSize,
        right_cnt: DataSize,
        gain: f64,
        parent_value: f64,
    ) -> i32 {
        let new_node = (self.num_leaves - 1) as usize;
        let parent = self.leaf_parent[leaf as usize];
        if parent >= 0 {
            // the leaf we split was a child of `parent`; repoint it
            if self.left_child[parent as usize] == !leaf {
                self.left_child[parent as usize] = new_node as i32;
            } else {
                self.right_child[parent as usize] = new_node as i32;
            }
        }
        self.split_feature_inner[new_node] = feature_inner;
        self.split_feature[new_node] = feature_real;
        self.threshold_in_bin[new_node] = threshold_bin;
        self.threshold[new_node] = threshold_double;
        self.decision_type[new_node] = if default_left { MASK_DEFAULT_LEFT } else { 0 };
        self.split_gain[new_node] = gain;
        self.internal_value[new_node] = parent_value;
        self.internal_count[new_node] = left_cnt + right_cnt;
        self.left_child[new_node] = !leaf;
        self.right_child[new_node] = !self.num_leaves;
        self.leaf_value[leaf as usize] = left_value;
        self.leaf_count[leaf as usize] = left_cnt;
        self.leaf_parent[leaf as usize] = new_node as i32;
        self.leaf_value[self.num_leaves as usize] = right_value;
        self.leaf_count[self.num_leaves as usize] = right_cnt;
        self.leaf_parent[self.num_leaves as usize] = new_node as i32;
        self.num_leaves += 1;
        new_node as i32
    }

    fn default_left(&self, node: usize) -> bool {
        self.decision_type[node] & MASK_DEFAULT_LEFT != 0
    }

    /// Scores one raw row. Missing columns read as 0.0, NaN follows the
    /// node's default direction.
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.leaf_value[self.predict_leaf_index(features) as usize]
    }

    /// Index of the leaf a raw row lands in.
    pub fn predict_leaf_index(&self, features: &[f64]) -> i32 {
        if self.num_leaves <= 1 {
            return 0;
        }
        let mut node = 0i32;
        loop {
            let n = node as usize;
            let value = features
                .get(self.split_feature[n] as usize)
                .copied()
                .unwrap_or(0.0);
            let go_left = if value.is_nan() {
                self.default_left(n)
            } else {
                value <= self.threshold[n]
            };
            node = if go_left {
                self.left_child[n]
            } else {
                self.right_child[n]
            };
            if node < 0 {
                return !node;
            }
        }
    }

    /// Adds this tree's output to every row's score, navigating the
    /// binned columns. Used for validation sets and full-data passes.
    pub fn add_prediction_to_score(&self, data: &Dataset, scores: &mut [Score]) {
        if self.num_leaves <= 1 {
            let v = self.leaf_value[0] as Score;
            scores.par_iter_mut().for_each(|s| *s += v);
            return;
        }
        let block = crate::core::constants::K_MIN_BLOCK_SIZE.max(
            data.num_data() / crate::core::utils::threading::num_threads().max(1) as DataSize + 1,
        ) as usize;
        scores
            .par_chunks_mut(block)
            .enumerate()
            .for_each(|(chunk, block_scores)| {
                let start = (chunk * block) as DataSize;
                let mut iters: Vec<_> = (0..self.num_leaves - 1)
                    .map(|n| {
                        data.feature_at(self.split_feature_inner[n as usize] as usize)
                            .bin_data()
                            .iterator()
                    })
                    .collect();
                let default_bins: Vec<BinIndex> = (0..self.num_leaves - 1)
                    .map(|n| {
                        data.feature_at(self.split_feature_inner[n as usize] as usize)
                            .bin_mapper()
                            .default_bin()
                    })
                    .collect();
                for (i, s) in block_scores.iter_mut().enumerate() {
                    let row = start + i as DataSize;
                    let leaf = self.leaf_for_binned_row(row, &mut iters, &default_bins);
                    *s += self.leaf_value[leaf as usize] as Score;
                }
            });
    }

    /// Adds this tree's output to the scores of the given ascending row
    /// indices. Used for out-of-bag rows.
    pub fn add_prediction_to_score_by_indices(
        &self,
        data: &Dataset,
        indices: &[DataSize],
        scores: &mut [Score],
    ) {
        if self.num_leaves <= 1 {
            let v = self.leaf_value[0] as Score;
            for &row in indices {
                scores[row as usize] += v;
            }
            return;
        }
        let mut iters: Vec<_> = (0..self.num_leaves - 1)
            .map(|n| {
                data.feature_at(self.split_feature_inner[n as usize] as usize)
                    .bin_data()
                    .iterator()
            })
            .collect();
        let default_bins: Vec<BinIndex> = (0..self.num_leaves - 1)
            .map(|n| {
                data.feature_at(self.split_feature_inner[n as usize] as usize)
                    .bin_mapper()
                    .default_bin()
            })
            .collect();
        for &row in indices {
            let leaf = self.leaf_for_binned_row(row, &mut iters, &default_bins);
            scores[row as usize] += self.leaf_value[leaf as usize] as Score;
        }
    }

    fn leaf_for_binned_row(
        &self,
        row: DataSize,
        iters: &mut [Box<dyn crate::io::bin::BinIterator + '_>],
        default_bins: &[BinIndex],
    ) -> i32 {
        let mut node = 0i32;
        loop {
            let n = node as usize;
            let bin = iters[n].get(row);
            let go_left = if bin == default_bins[n] {
                self.default_left(n)
            } else {
                bin <= self.threshold_in_bin[n]
            };
            node = if go_left {
                self.left_child[n]
            } else {
                self.right_child[n]
            };
            if node < 0 {
                return !node;
            }
        }
    }

    /// Scales every output by `rate`. Composes multiplicatively.
    pub fn shrinkage(&mut self, rate: f64) {
        for v in self.leaf_value[..self.num_leaves as usize].iter_mut() {
            *v *= rate;
        }
        for v in self.internal_value[..(self.num_leaves - 1).max(0) as usize].iter_mut() {
            *v *= rate;
        }
    }

    /// Serialises to the newline-delimited `key=value` block the model
    /// file stores per tree.
    pub fn to_string_block(&self) -> String {
        let n = (self.num_leaves - 1) as usize;
        let l = self.num_leaves as usize;
        let mut out = String::new();
        out.push_str(&format!("num_leaves={}\n", self.num_leaves));
        out.push_str(&format!(
            "split_feature={}\n",
            common::array_to_string(&self.split_feature[..n], ' ')
        ));
        out.push_str(&format!(
            "split_gain={}\n",
            common::array_to_string(&self.split_gain[..n], ' ')
        ));
        out.push_str(&format!(
            "threshold={}\n",
            common::array_to_string(&self.threshold[..n], ' ')
        ));
        out.push_str(&format!(
            "decision_type={}\n",
            common::array_to_string(&self.decision_type[..n], ' ')
        ));
        out.push_str(&format!(
            "left_child={}\n",
            common::array_to_string(&self.left_child[..n], ' ')
        ));
        out.push_str(&format!(
            "right_child={}\n",
            common::array_to_string(&self.right_child[..n], ' ')
        ));
        out.push_str(&format!(
            "leaf_value={}\n",
            common::array_to_string(&self.leaf_value[..l], ' ')
        ));
        out.push_str(&format!(
            "leaf_count={}\n",
            common::array_to_string(&self.leaf_count[..l], ' ')
        ));
        out.push_str(&format!(
            "internal_value={}\n",
            common::array_to_string(&self.internal_value[..n], ' ')
        ));
        out.push_str(&format!(
            "internal_count={}\n",
            common::array_to_string(&self.internal_count[..n], ' ')
        ));
        out
    }

    /// Restores a tree from its `key=value` block.
    pub fn from_string_block(block: &str) -> Result<Self> {
        let mut map = std::collections::HashMap::new();
        for line in block.lines() {
            if let Some(pos) = line.find('=') {
                map.insert(line[..pos].trim().to_string(), line[pos + 1..].trim().to_string());
            }
        }
        let num_leaves: i32 = map
            .get("num_leaves")
            .ok_or_else(|| BoostError::model("tree block is missing num_leaves"))?
            .parse()
            .map_err(|_| BoostError::model("cannot parse num_leaves"))?;
        if num_leaves < 1 {
            return Err(BoostError::model("num_leaves must be positive"));
        }
        let mut tree = Tree::new(num_leaves);
        tree.num_leaves = num_leaves;
        let n = (num_leaves - 1) as usize;
        let l = num_leaves as usize;
        tree.split_feature = parse_vec(&map, "split_feature", n, true)?;
        tree.split_gain = parse_vec(&map, "split_gain", n, false)?;
        tree.threshold = parse_vec(&map, "threshold", n, true)?;
        tree.decision_type = parse_vec(&map, "decision_type", n, false)?;
        tree.left_child = parse_vec(&map, "left_child", n, true)?;
        tree.right_child = parse_vec(&map, "right_child", n, true)?;
        tree.leaf_value = parse_vec(&map, "leaf_value", l, true)?;
        tree.leaf_count = parse_vec(&map, "leaf_count", l, false)?;
        tree.internal_value = parse_vec(&map, "internal_value", n, false)?;
        tree.internal_count = parse_vec(&map, "internal_count", n, false)?;
        tree.split_feature_inner = vec![-1; n];
        tree.threshold_in_bin = vec![0; n];
        Ok(tree)
    }
}

fn parse_vec<T>(
    map: &std::collections::HashMap<String, String>,
    key: &str,
    expect: usize,
    required: bool,
) -> Result<Vec<T>>
where
    T: std::str::FromStr + Default + Clone,
{
    match map.get(key) {
        None => {
            if required && expect > 0 {
                Err(BoostError::model(format!("tree block is missing {}", key)))
            } else {
                Ok(vec![T::default(); expect])
            }
        }
        Some(value) => {
            let parsed: std::result::Result<Vec<T>, _> =
                value.split_whitespace().map(|t| t.parse::<T>()).collect();
            let parsed =
                parsed.map_err(|_| BoostError::model(format!("cannot parse {} values", key)))?;
            if parsed.len() != expect {
                return Err(BoostError::model(format!(
                    "truncated tree: {} has {} values, expected {}",
                    key,
                    parsed.len(),
                    expect
                )));
            }
            Ok(parsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_split_tree() -> Tree {
        let mut tree = Tree::new(4);
        // root split on raw column 0 at 0.5
        tree.split(0, 0, 0, 0, 0.5, true, 1.0, 2.0, 10, 20, 5.0, 1.5);
        // split the right leaf (leaf 1) on column 1 at 3.5
        tree.split(1, 1, 1, 3, 3.5, false, 2.5, 3.5, 12, 8, 2.0, 2.0);
        tree
    }

    #[test]
    fn leaves_exceed_internals_by_one() {
        let tree = two_split_tree();
        assert_eq!(tree.num_leaves(), 3);
    }

    #[test]
    fn predict_follows_thresholds() {
        let tree = two_split_tree();
        assert_eq!(tree.predict(&[0.0, 0.0]), 1.0);
        assert_eq!(tree.predict(&[1.0, 3.0]), 2.5);
        assert_eq!(tree.predict(&[1.0, 4.0]), 3.5);
    }

    #[test]
    fn nan_follows_default_direction() {
        let tree = two_split_tree();
        // root default_left = true
        assert_eq!(tree.predict(&[f64::NAN, 0.0]), 1.0);
        // node 1 default_left = false
        assert_eq!(tree.predict(&[1.0, f64::NAN]), 3.5);
    }

    #[test]
    fn shrinkage_composes() {
        let mut tree = two_split_tree();
        let before: Vec<f64> = (0..3).map(|l| tree.leaf_output(l)).collect();
        tree.shrinkage(0.1);
        tree.shrinkage(-1.0);
        tree.shrinkage(10.0);
        // 0.1 * -1 * 10 = -1
        for (l, b) in before.iter().enumerate() {
            assert!((tree.leaf_output(l as i32) + b).abs() < 1e-12);
        }
    }

    #[test]
    fn string_roundtrip_preserves_predictions() {
        let tree = two_split_tree();
        let block = tree.to_string_block();
        let restored = Tree::from_string_block(&block).unwrap();
        for row in &[[0.0, 0.0], [1.0, 3.0], [1.0, 4.0], [0.5, 3.5]] {
            assert_eq!(tree.predict(row), restored.predict(row));
        }
    }

    #[test]
    fn truncated_block_is_rejected() {
        let tree = two_split_tree();
        let mut block = tree.to_string_block();
        block = block.replace("left_child=-1 -2\n", "left_child=-1\n");
        assert!(Tree::from_string_block(&block).is_err());
        assert!(Tree::from_string_block("split_feature=0 1\n").is_err());
    }

    #[test]
    fn single_leaf_tree_roundtrip() {
        let tree = Tree::new(2);
        let restored = Tree::from_string_block(&tree.to_string_block()).unwrap();
        assert_eq!(restored.num_leaves(), 1);
        assert_eq!(restored.predict(&[1.0]), 0.0);
    }
}
