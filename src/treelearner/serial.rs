//! Single-machine leaf-wise tree learner.
//!
//! Per tree: seed the root, then repeatedly take the leaf whose stored
//! best split has the highest gain, apply it, and refresh the two
//! children. The smaller child's histograms are built from scratch; the
//! larger child reuses the parent's cached histograms minus the
//! sibling's.

use crate::config::TreeConfig;
use crate::core::error::Result;
use crate::core::types::{DataSize, Score};
use crate::core::utils::random::Random;
use crate::dataset::Dataset;
use crate::io::ordered_bin::OrderedBin;
use crate::io::tree::Tree;
use crate::treelearner::data_partition::DataPartition;
use crate::treelearner::feature_histogram::calculate_leaf_output;
use crate::treelearner::histogram_pool::HistogramPool;
use crate::treelearner::leaf_splits::LeafSplits;
use crate::treelearner::split_info::SplitInfo;
use rayon::prelude::*;
use std::sync::Arc;

pub struct SerialTreeLearner {
    pub(crate) tree_config: TreeConfig,
    pub(crate) train_data: Arc<Dataset>,
    pub(crate) num_data: DataSize,
    pub(crate) num_features: usize,
    pub(crate) data_partition: DataPartition,
    pub(crate) smaller_leaf_splits: LeafSplits,
    pub(crate) larger_leaf_splits: LeafSplits,
    pub(crate) histogram_pool: HistogramPool,
    pub(crate) best_split_per_leaf: Vec<SplitInfo>,
    ordered_gradients: Vec<Score>,
    ordered_hessians: Vec<Score>,
    ordered_bins: Vec<Option<Box<dyn OrderedBin>>>,
    has_ordered_bin: bool,
    pub(crate) is_feature_used: Vec<bool>,
    /// Extra restriction on searchable features, used by the parallel
    /// learners to assign feature shards.
    pub(crate) feature_mask: Option<Vec<bool>>,
    col_sample_rng: Random,
    /// Bagging membership flags for the ordered bins; empty = all rows.
    used_flags: Vec<u8>,
    /// Scratch flags marking the left child's rows during a split.
    left_flags: Vec<u8>,
    pub(crate) smaller_leaf: i32,
    pub(crate) larger_leaf: i32,
}

impl SerialTreeLearner {
    pub fn new(tree_config: &TreeConfig, train_data: Arc<Dataset>) -> Self {
        let num_data = train_data.num_data();
        let num_features = train_data.num_features();
        let num_leaves = tree_config.num_leaves as usize;
        let cache_size = if tree_config.histogram_pool_size < 0 {
            num_leaves
        } else {
            tree_config.histogram_pool_size as usize
        };
        let mut histogram_pool = HistogramPool::new();
        histogram_pool.reset(cache_size, num_leaves);
        let num_bins: Vec<i32> = (0..num_features)
            .map(|f| train_data.feature_at(f).num_bin())
            .collect();
        histogram_pool.fill(&num_bins);

        let ordered_bins: Vec<Option<Box<dyn OrderedBin>>> = (0..num_features)
            .map(|f| train_data.feature_at(f).create_ordered_bin())
            .collect();
        let has_ordered_bin = ordered_bins.iter().any(|b| b.is_some());

        SerialTreeLearner {
            col_sample_rng: Random::with_seed(tree_config.feature_fraction_seed),
            tree_config: tree_config.clone(),
            num_data,
            num_features,
            data_partition: DataPartition::new(num_data, num_leaves),
            smaller_leaf_splits: LeafSplits::new(),
            larger_leaf_splits: LeafSplits::new(),
            histogram_pool,
            best_split_per_leaf: vec![SplitInfo::new(); num_leaves],
            ordered_gradients: vec![0.0; num_data as usize],
            ordered_hessians: vec![0.0; num_data as usize],
            ordered_bins,
            has_ordered_bin,
            is_feature_used: vec![true; num_features],
            feature_mask: None,
            used_flags: Vec::new(),
            left_flags: if has_ordered_bin {
                vec![0; num_data as usize]
            } else {
                Vec::new()
            },
            smaller_leaf: 0,
            larger_leaf: -1,
            train_data,
        }
    }

    /// Installs the bagging subset used by subsequent trees.
    pub fn set_bagging_data(&mut self, bag_indices: &[DataSize]) {
        self.data_partition.set_used_data_indices(bag_indices);
        if self.has_ordered_bin {
            self.used_flags = vec![0; self.num_data as usize];
            for &row in bag_indices {
                self.used_flags[row as usize] = 1;
            }
        }
    }

    /// Trains one tree against the given gradients and hessians (both
    /// `num_data` long, the current class's slice).
    pub fn train(&mut self, gradients: &[Score], hessians: &[Score]) -> Result<Tree> {
        self.before_train(gradients, hessians);
        let mut tree = Tree::new(self.tree_config.num_leaves);
        for _ in 0..self.tree_config.num_leaves - 1 {
            self.find_best_splits(gradients, hessians);
            let best_leaf = self.best_leaf(&tree);
            let info = &self.best_split_per_leaf[best_leaf as usize];
            if !info.is_valid() || info.gain <= 0.0 {
                break;
            }
            self.split_leaf(&mut tree, best_leaf);
        }
        Ok(tree)
    }

    /// Fast-path score update: every row gets the output of the leaf the
    /// last trained tree put it in.
    pub fn add_prediction_to_score(&self, tree: &Tree, scores: &mut [Score]) {
        for leaf in 0..tree.num_leaves() {
            let output = tree.leaf_output(leaf) as Score;
            for &row in self.data_partition.leaf_indices(leaf) {
                scores[row as usize] += output;
            }
        }
    }

    pub(crate) fn before_train(&mut self, gradients: &[Score], hessians: &[Score]) {
        self.histogram_pool.reset_map();

        // per-tree column sampling
        if self.tree_config.feature_fraction < 1.0 {
            let used_cnt =
                ((self.num_features as f64 * self.tree_config.feature_fraction) as i32).max(1);
            self.is_feature_used.fill(false);
            let sampled = self.col_sample_rng.sample(self.num_features as i32, used_cnt);
            for f in sampled {
                self.is_feature_used[f as usize] = true;
            }
        } else {
            self.is_feature_used.fill(true);
        }
        if let Some(mask) = &self.feature_mask {
            for (used, &allowed) in self.is_feature_used.iter_mut().zip(mask.iter()) {
                *used = *used && allowed;
            }
        }

        self.data_partition.init();

        if self.has_ordered_bin {
            let flags = if self.used_flags.is_empty() {
                None
            } else {
                Some(self.used_flags.as_slice())
            };
            let num_leaves = self.tree_config.num_leaves;
            self.ordered_bins.par_iter_mut().for_each(|ob| {
                if let Some(ob) = ob {
                    ob.init(flags, num_leaves);
                }
            });
        }

        if self.data_partition.used_data_count() < self.num_data {
            self.smaller_leaf_splits.init_with_indices(
                self.data_partition.leaf_indices(0),
                gradients,
                hessians,
            );
        } else {
            self.smaller_leaf_splits.init_all(gradients, hessians);
        }
        self.larger_leaf_splits.init_empty();
        self.smaller_leaf = 0;
        self.larger_leaf = -1;
        for info in self.best_split_per_leaf.iter_mut() {
            *info = SplitInfo::new();
        }
    }

    /// Builds histograms for the current smaller (and, if needed,
    /// larger) leaf and refreshes their stored best splits.
    pub(crate) fn find_best_splits(&mut self, gradients: &[Score], hessians: &[Score]) {
        let (smaller_slot, _) = self.histogram_pool.get(self.smaller_leaf);
        self.construct_histograms(self.smaller_leaf, smaller_slot, gradients, hessians, true);
        self.best_split_per_leaf[self.smaller_leaf as usize] =
            self.find_leaf_best_split(smaller_slot, true);

        if self.larger_leaf >= 0 {
            let (larger_slot, cached) = self.histogram_pool.get(self.larger_leaf);
            if cached {
                // parent minus sibling
                let is_used = &self.is_feature_used;
                let (larger_hists, smaller_hists) =
                    self.histogram_pool.slot_pair(larger_slot, smaller_slot);
                larger_hists
                    .par_iter_mut()
                    .zip(smaller_hists.par_iter())
                    .enumerate()
                    .for_each(|(f, (l, s))| {
                        if is_used[f] {
                            l.subtract(s);
                        }
                    });
            } else {
                self.construct_histograms(self.larger_leaf, larger_slot, gradients, hessians, false);
            }
            self.best_split_per_leaf[self.larger_leaf as usize] =
                self.find_leaf_best_split(larger_slot, false);
        }
    }

    /// Leaf with the best stored split among the tree's current leaves.
    pub(crate) fn best_leaf(&self, tree: &Tree) -> i32 {
        let mut best = 0i32;
        for leaf in 1..tree.num_leaves() {
            if self.best_split_per_leaf[leaf as usize]
                .is_better_than(&self.best_split_per_leaf[best as usize])
            {
                best = leaf;
            }
        }
        best
    }

    /// Applies the stored best split of `best_leaf` to the tree, the
    /// partition and the ordered bins, and re-seeds the child leaf sums.
    pub(crate) fn split_leaf(&mut self, tree: &mut Tree, best_leaf: i32) {
        let info = self.best_split_per_leaf[best_leaf as usize].clone();
        let inner = info.feature as usize;
        let real_index = self.train_data.feature_at(inner).feature_index();
        let threshold_real = self
            .train_data
            .feature_at(inner)
            .bin_mapper()
            .bin_to_value(info.threshold);
        let default_bin = self.train_data.feature_at(inner).bin_mapper().default_bin();
        let parent_output = calculate_leaf_output(
            info.left_sum_gradient + info.right_sum_gradient,
            info.left_sum_hessian + info.right_sum_hessian,
            self.tree_config.lambda_l2,
        );
        tree.split(
            best_leaf,
            inner as i32,
            real_index,
            info.threshold,
            threshold_real,
            info.default_left,
            info.left_output,
            info.right_output,
            info.left_count,
            info.right_count,
            info.gain,
            parent_output,
        );
        let right_leaf = tree.num_leaves() - 1;

        self.data_partition.split(
            best_leaf,
            self.train_data.feature_at(inner).bin_data(),
            info.threshold,
            default_bin,
            info.default_left,
            right_leaf,
        );

        if self.has_ordered_bin {
            for &row in self.data_partition.leaf_indices(best_leaf) {
                self.left_flags[row as usize] = 1;
            }
            let flags = &self.left_flags;
            self.ordered_bins.par_iter_mut().for_each(|ob| {
                if let Some(ob) = ob {
                    ob.split(best_leaf, right_leaf, flags);
                }
            });
            for &row in self.data_partition.leaf_indices(best_leaf) {
                self.left_flags[row as usize] = 0;
            }
        }

        if info.left_count < info.right_count {
            self.smaller_leaf = best_leaf;
            self.larger_leaf = right_leaf;
            self.smaller_leaf_splits.init_with_sums(
                best_leaf,
                info.left_count,
                info.left_sum_gradient,
                info.left_sum_hessian,
            );
            self.larger_leaf_splits.init_with_sums(
                right_leaf,
                info.right_count,
                info.right_sum_gradient,
                info.right_sum_hessian,
            );
            // the parent's cached histograms now describe the larger
            // (right) child after subtraction
            self.histogram_pool.move_to(best_leaf, right_leaf);
        } else {
            self.smaller_leaf = right_leaf;
            self.larger_leaf = best_leaf;
            self.smaller_leaf_splits.init_with_sums(
                right_leaf,
                info.right_count,
                info.right_sum_gradient,
                info.right_sum_hessian,
            );
            self.larger_leaf_splits.init_with_sums(
                best_leaf,
                info.left_count,
                info.left_sum_gradient,
                info.left_sum_hessian,
            );
        }
        self.best_split_per_leaf[best_leaf as usize] = SplitInfo::new();
        self.best_split_per_leaf[right_leaf as usize] = SplitInfo::new();
    }

    pub(crate) fn construct_histograms(
        &mut self,
        leaf: i32,
        slot: usize,
        gradients: &[Score],
        hessians: &[Score],
        is_smaller: bool,
    ) {
        let indices = self.data_partition.leaf_indices(leaf);
        let cnt = indices.len();
        self.ordered_gradients[..cnt]
            .par_iter_mut()
            .zip(indices.par_iter())
            .for_each(|(o, &idx)| *o = gradients[idx as usize]);
        self.ordered_hessians[..cnt]
            .par_iter_mut()
            .zip(indices.par_iter())
            .for_each(|(o, &idx)| *o = hessians[idx as usize]);

        let leaf_splits = if is_smaller {
            &self.smaller_leaf_splits
        } else {
            &self.larger_leaf_splits
        };
        let sum_g = leaf_splits.sum_gradients();
        let sum_h = leaf_splits.sum_hessians();
        let leaf_cnt = leaf_splits.num_data_in_leaf();

        let is_used = &self.is_feature_used;
        let ordered_bins = &self.ordered_bins;
        let train_data = &self.train_data;
        let og = &self.ordered_gradients;
        let oh = &self.ordered_hessians;
        let hists = self.histogram_pool.slot_mut(slot);
        hists.par_iter_mut().enumerate().for_each(|(f, hist)| {
            if !is_used[f] {
                return;
            }
            hist.reset();
            match &ordered_bins[f] {
                Some(ob) => {
                    ob.construct_histogram(leaf, gradients, hessians, hist.data_mut());
                    hist.fix_default_bin(
                        train_data.feature_at(f).bin_mapper().default_bin(),
                        sum_g,
                        sum_h,
                        leaf_cnt,
                    );
                }
                None => {
                    train_data.feature_at(f).bin_data().construct_histogram(
                        indices,
                        &og[..cnt],
                        &oh[..cnt],
                        hist.data_mut(),
                    );
                }
            }
        });
    }

    pub(crate) fn find_leaf_best_split(&self, slot: usize, is_smaller: bool) -> SplitInfo {
        let leaf_splits = if is_smaller {
            &self.smaller_leaf_splits
        } else {
            &self.larger_leaf_splits
        };
        let hists = self.histogram_pool.slot(slot);
        (0..self.num_features)
            .into_par_iter()
            .filter(|&f| self.is_feature_used[f])
            .map(|f| {
                let mapper = self.train_data.feature_at(f).bin_mapper();
                hists[f].find_best_threshold(
                    f as i32,
                    mapper.default_bin(),
                    leaf_splits.sum_gradients(),
                    leaf_splits.sum_hessians(),
                    leaf_splits.num_data_in_leaf(),
                    &self.tree_config,
                )
            })
            .reduce(SplitInfo::new, |a, b| if b.is_better_than(&a) { b } else { a })
    }

    pub fn train_data(&self) -> &Arc<Dataset> {
        &self.train_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn learner_config() -> TreeConfig {
        TreeConfig {
            num_leaves: 4,
            min_data_in_leaf: 1,
            min_sum_hessian_in_leaf: 0.0,
            ..TreeConfig::default()
        }
    }

    fn l2_gradients(labels: &[f32], scores: &[f32]) -> (Vec<Score>, Vec<Score>) {
        let g: Vec<Score> = labels.iter().zip(scores).map(|(&l, &s)| s - l).collect();
        let h = vec![1.0; labels.len()];
        (g, h)
    }

    #[test]
    fn fits_a_step_function_exactly() {
        // y = [0, 1, 4, 9] on x = [0, 1, 2, 3], enough leaves for all
        let features = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let labels = vec![0.0f32, 1.0, 4.0, 9.0];
        let data =
            Arc::new(Dataset::from_matrix(features.view(), &labels, 255, true, 1).unwrap());
        let mut learner = SerialTreeLearner::new(&learner_config(), data);
        let (g, h) = l2_gradients(&labels, &[0.0; 4]);
        let tree = learner.train(&g, &h).unwrap();
        assert_eq!(tree.num_leaves(), 4);
        for (i, &x) in [0.0, 1.0, 2.0, 3.0].iter().enumerate() {
            assert!((tree.predict(&[x]) - labels[i] as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn fast_path_matches_tree_outputs() {
        let n = 256;
        let features = Array2::from_shape_fn((n, 2), |(r, c)| ((r * (c + 3)) % 17) as f64);
        let labels: Vec<f32> = (0..n).map(|r| ((r % 17) as f32) * 0.5).collect();
        let data =
            Arc::new(Dataset::from_matrix(features.view(), &labels, 64, true, 1).unwrap());
        let mut config = learner_config();
        config.num_leaves = 8;
        let mut learner = SerialTreeLearner::new(&config, data.clone());
        let (g, h) = l2_gradients(&labels, &vec![0.0; n]);
        let tree = learner.train(&g, &h).unwrap();

        let mut fast = vec![0.0f32; n];
        learner.add_prediction_to_score(&tree, &mut fast);
        let mut slow = vec![0.0f32; n];
        tree.add_prediction_to_score(&data, &mut slow);
        for i in 0..n {
            assert!((fast[i] - slow[i]).abs() < 1e-5, "row {}", i);
        }
    }

    #[test]
    fn no_split_when_gradients_are_flat() {
        let features = Array2::from_shape_vec((8, 1), (0..8).map(|i| i as f64).collect()).unwrap();
        let labels = vec![1.0f32; 8];
        let data =
            Arc::new(Dataset::from_matrix(features.view(), &labels, 255, true, 1).unwrap());
        let mut learner = SerialTreeLearner::new(&learner_config(), data);
        // scores already equal labels: every gradient zero
        let (g, h) = l2_gradients(&labels, &[1.0; 8]);
        let tree = learner.train(&g, &h).unwrap();
        assert_eq!(tree.num_leaves(), 1);
    }

    #[test]
    fn bagging_trains_on_the_subset_only() {
        let n = 64;
        let features = Array2::from_shape_fn((n, 1), |(r, _)| (r % 4) as f64);
        let labels: Vec<f32> = (0..n).map(|r| (r % 4) as f32).collect();
        let data =
            Arc::new(Dataset::from_matrix(features.view(), &labels, 255, true, 1).unwrap());
        let mut learner = SerialTreeLearner::new(&learner_config(), data);
        let bag: Vec<DataSize> = (0..n as DataSize).filter(|r| r % 2 == 0).collect();
        learner.set_bagging_data(&bag);
        let (g, h) = l2_gradients(&labels, &vec![0.0; n]);
        let tree = learner.train(&g, &h).unwrap();
        assert!(tree.num_leaves() > 1);
        // all training rows fall into the fitted range
        for r in 0..4 {
            let p = tree.predict(&[r as f64]);
            assert!((p - r as f64).abs() < 1e-9);
        }
    }
}
