//! Feature-parallel tree learner.
//!
//! Every machine holds all rows and searches a disjoint feature shard;
//! the best local splits are allreduced with an argmax-by-gain reducer
//! and the winning split is applied identically on every machine.

use crate::core::error::Result;
use crate::core::network::Network;
use crate::core::types::Score;
use crate::io::tree::Tree;
use crate::treelearner::serial::SerialTreeLearner;
use crate::treelearner::split_info::SplitInfo;
use std::sync::Arc;

pub struct FeatureParallelTreeLearner {
    pub(crate) inner: SerialTreeLearner,
    network: Arc<Network>,
}

impl FeatureParallelTreeLearner {
    pub fn new(mut inner: SerialTreeLearner, network: Arc<Network>) -> Self {
        let rank = network.rank();
        let num_machines = network.num_machines();
        let num_features = inner.train_data().num_features();
        // deterministic round-robin feature shard
        let mask: Vec<bool> = (0..num_features)
            .map(|f| (f as i32) % num_machines == rank)
            .collect();
        inner.feature_mask = Some(mask);
        FeatureParallelTreeLearner { inner, network }
    }

    pub fn train(&mut self, gradients: &[Score], hessians: &[Score]) -> Result<Tree> {
        self.inner.before_train(gradients, hessians);
        let mut tree = Tree::new(self.inner.tree_config.num_leaves);
        for _ in 0..self.inner.tree_config.num_leaves - 1 {
            self.inner.find_best_splits(gradients, hessians);
            self.sync_best_splits()?;
            let best_leaf = self.inner.best_leaf(&tree);
            let info = &self.inner.best_split_per_leaf[best_leaf as usize];
            if !info.is_valid() || info.gain <= 0.0 {
                break;
            }
            self.inner.split_leaf(&mut tree, best_leaf);
        }
        Ok(tree)
    }

    /// Replaces the smaller/larger leaves' local best splits with the
    /// global winners.
    fn sync_best_splits(&mut self) -> Result<()> {
        let smaller = self.inner.smaller_leaf;
        let larger = self.inner.larger_leaf;
        let locals = [
            self.inner.best_split_per_leaf[smaller as usize].clone(),
            if larger >= 0 {
                self.inner.best_split_per_leaf[larger as usize].clone()
            } else {
                SplitInfo::new()
            },
        ];
        let winners = allreduce_best_splits(&self.network, &locals)?;
        self.inner.best_split_per_leaf[smaller as usize] = winners[0].clone();
        if larger >= 0 {
            self.inner.best_split_per_leaf[larger as usize] = winners[1].clone();
        }
        Ok(())
    }
}

/// Argmax-by-gain allreduce over a batch of split candidates. The
/// reducer keeps the better candidate per slot under the same ordering
/// the local search uses, so every machine agrees on the winner.
pub(crate) fn allreduce_best_splits(
    network: &Network,
    locals: &[SplitInfo],
) -> Result<Vec<SplitInfo>> {
    let stride = SplitInfo::SERIALIZED_SIZE;
    let mut send = vec![0u8; stride * locals.len()];
    for (i, info) in locals.iter().enumerate() {
        info.to_bytes(&mut send[i * stride..(i + 1) * stride]);
    }
    let mut recv = vec![0u8; send.len()];
    network.allreduce(&send, &mut recv, &move |src: &[u8], dst: &mut [u8]| {
        for (s, d) in src.chunks_exact(stride).zip(dst.chunks_exact_mut(stride)) {
            let src_info = SplitInfo::from_bytes(s);
            let dst_info = SplitInfo::from_bytes(d);
            if src_info.is_better_than(&dst_info) {
                d.copy_from_slice(s);
            }
        }
    })?;
    Ok(recv.chunks_exact(stride).map(SplitInfo::from_bytes).collect())
}
