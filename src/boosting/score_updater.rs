//! Additive score bookkeeping for one dataset.

use crate::core::types::{DataSize, Score};
use crate::dataset::Dataset;
use crate::io::tree::Tree;
use crate::treelearner::TreeLearner;
use std::sync::Arc;

/// Holds `num_data * num_class` scores, class-major, seeded from the
/// dataset's init scores when present.
pub struct ScoreUpdater {
    data: Arc<Dataset>,
    score: Vec<Score>,
    num_data: DataSize,
    num_class: i32,
}

impl ScoreUpdater {
    pub fn new(data: Arc<Dataset>, num_class: i32) -> Self {
        let num_data = data.num_data();
        let len = num_data as usize * num_class as usize;
        let mut score = vec![0.0 as Score; len];
        if let Some(init) = data.metadata().init_score() {
            for (s, &v) in score.iter_mut().zip(init.iter()) {
                *s = v as Score;
            }
        }
        ScoreUpdater {
            data,
            score,
            num_data,
            num_class,
        }
    }

    pub fn num_data(&self) -> DataSize {
        self.num_data
    }

    pub fn score(&self) -> &[Score] {
        &self.score
    }

    fn class_slice_mut(&mut self, class: usize) -> &mut [Score] {
        let n = self.num_data as usize;
        &mut self.score[class * n..(class + 1) * n]
    }

    /// Fast path: leaf outputs routed through the learner's last
    /// partition.
    pub fn add_score_by_learner(&mut self, learner: &TreeLearner, tree: &Tree, class: usize) {
        let slice = self.class_slice_mut(class);
        learner.add_prediction_to_score(tree, slice);
    }

    /// Slow path: full traversal over the binned columns.
    pub fn add_score_by_tree(&mut self, tree: &Tree, class: usize) {
        let data = self.data.clone();
        let slice = self.class_slice_mut(class);
        tree.add_prediction_to_score(&data, slice);
    }

    /// Slow path over chosen rows, used for out-of-bag updates.
    pub fn add_score_by_indices(&mut self, tree: &Tree, indices: &[DataSize], class: usize) {
        let data = self.data.clone();
        let slice = self.class_slice_mut(class);
        tree.add_prediction_to_score_by_indices(&data, indices, slice);
    }

    pub fn num_class(&self) -> i32 {
        self.num_class
    }
}
