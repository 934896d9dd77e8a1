//! Tree learning: leaf-wise growth over pre-binned histograms, with
//! serial, feature-parallel and data-parallel drivers.

pub mod data_parallel;
pub mod data_partition;
pub mod feature_histogram;
pub mod feature_parallel;
pub mod histogram_pool;
pub mod leaf_splits;
pub mod serial;
pub mod split_info;

pub use split_info::SplitInfo;

use crate::config::TreeConfig;
use crate::core::error::Result;
use crate::core::network::Network;
use crate::core::types::{DataSize, Score, TreeLearnerType};
use crate::dataset::Dataset;
use crate::io::tree::Tree;
use data_parallel::DataParallelTreeLearner;
use feature_parallel::FeatureParallelTreeLearner;
use serial::SerialTreeLearner;
use std::sync::Arc;

/// Sealed set of tree learners the boosting controller can drive.
pub enum TreeLearner {
    Serial(SerialTreeLearner),
    FeatureParallel(FeatureParallelTreeLearner),
    DataParallel(DataParallelTreeLearner),
}

impl TreeLearner {
    pub fn create(
        learner_type: TreeLearnerType,
        tree_config: &TreeConfig,
        train_data: Arc<Dataset>,
        network: Arc<Network>,
    ) -> Self {
        let serial = SerialTreeLearner::new(tree_config, train_data);
        match learner_type {
            TreeLearnerType::Serial => TreeLearner::Serial(serial),
            TreeLearnerType::Feature => {
                TreeLearner::FeatureParallel(FeatureParallelTreeLearner::new(serial, network))
            }
            TreeLearnerType::Data => {
                TreeLearner::DataParallel(DataParallelTreeLearner::new(serial, network))
            }
        }
    }

    /// Trains one tree on the given gradient/hessian slices.
    pub fn train(&mut self, gradients: &[Score], hessians: &[Score]) -> Result<Tree> {
        match self {
            TreeLearner::Serial(l) => l.train(gradients, hessians),
            TreeLearner::FeatureParallel(l) => l.train(gradients, hessians),
            TreeLearner::DataParallel(l) => l.train(gradients, hessians),
        }
    }

    pub fn set_bagging_data(&mut self, bag_indices: &[DataSize]) {
        match self {
            TreeLearner::Serial(l) => l.set_bagging_data(bag_indices),
            TreeLearner::FeatureParallel(l) => l.inner.set_bagging_data(bag_indices),
            TreeLearner::DataParallel(l) => l.inner.set_bagging_data(bag_indices),
        }
    }

    /// Fast-path score update from the last trained tree's partition.
    pub fn add_prediction_to_score(&self, tree: &Tree, scores: &mut [Score]) {
        match self {
            TreeLearner::Serial(l) => l.add_prediction_to_score(tree, scores),
            TreeLearner::FeatureParallel(l) => l.inner.add_prediction_to_score(tree, scores),
            TreeLearner::DataParallel(l) => l.inner.add_prediction_to_score(tree, scores),
        }
    }
}
