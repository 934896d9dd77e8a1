//! Data-parallel tree learner.
//!
//! Every machine holds a disjoint row slice and all features. Per-leaf
//! histograms are summed across machines before the split search; each
//! machine searches the feature shard assigned to it by a deterministic
//! balancing of bin counts, and the winners are argmax-allreduced.

use crate::core::error::Result;
use crate::core::network::Network;
use crate::core::types::{DataSize, Score};
use crate::io::bin::HistogramBinEntry;
use crate::io::tree::Tree;
use crate::treelearner::feature_parallel::allreduce_best_splits;
use crate::treelearner::serial::SerialTreeLearner;
use crate::treelearner::split_info::SplitInfo;
use rayon::prelude::*;
use std::sync::Arc;

const ENTRY_BYTES: usize = 8 + 8 + 4;

pub struct DataParallelTreeLearner {
    pub(crate) inner: SerialTreeLearner,
    network: Arc<Network>,
    /// Features this machine runs the split search for.
    feature_shard: Vec<bool>,
}

impl DataParallelTreeLearner {
    pub fn new(inner: SerialTreeLearner, network: Arc<Network>) -> Self {
        let rank = network.rank();
        let num_machines = network.num_machines() as usize;
        let data = inner.train_data();
        // balance total bin counts across machines, feature order fixed
        let mut load = vec![0i64; num_machines];
        let mut shard = vec![false; data.num_features()];
        for f in 0..data.num_features() {
            let machine = (0..num_machines).min_by_key(|&m| (load[m], m)).unwrap();
            load[machine] += data.feature_at(f).num_bin() as i64;
            shard[f] = machine as i32 == rank;
        }
        DataParallelTreeLearner {
            inner,
            network,
            feature_shard: shard,
        }
    }

    pub fn train(&mut self, gradients: &[Score], hessians: &[Score]) -> Result<Tree> {
        self.inner.before_train(gradients, hessians);
        self.sync_root_sums()?;
        let mut tree = Tree::new(self.inner.tree_config.num_leaves);
        for _ in 0..self.inner.tree_config.num_leaves - 1 {
            self.find_best_splits_global(gradients, hessians)?;
            let best_leaf = self.inner.best_leaf(&tree);
            let info = &self.inner.best_split_per_leaf[best_leaf as usize];
            if !info.is_valid() || info.gain <= 0.0 {
                break;
            }
            self.inner.split_leaf(&mut tree, best_leaf);
        }
        Ok(tree)
    }

    /// Replaces the local root gradient/hessian sums with the global
    /// ones.
    fn sync_root_sums(&mut self) -> Result<()> {
        let local = [
            self.inner.smaller_leaf_splits.sum_gradients(),
            self.inner.smaller_leaf_splits.sum_hessians(),
            self.inner.smaller_leaf_splits.num_data_in_leaf() as f64,
        ];
        let send: Vec<u8> = local.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut recv = vec![0u8; send.len()];
        self.network
            .allreduce(&send, &mut recv, &crate::core::network::reduce_sum_f64)?;
        let read = |i: usize| f64::from_le_bytes(recv[i * 8..(i + 1) * 8].try_into().unwrap());
        self.inner.smaller_leaf_splits.init_with_sums(
            0,
            read(2) as DataSize,
            read(0),
            read(1),
        );
        Ok(())
    }

    fn find_best_splits_global(&mut self, gradients: &[Score], hessians: &[Score]) -> Result<()> {
        let smaller = self.inner.smaller_leaf;
        let larger = self.inner.larger_leaf;

        let (smaller_slot, _) = self.inner.histogram_pool.get(smaller);
        self.inner
            .construct_histograms(smaller, smaller_slot, gradients, hessians, true);
        self.allreduce_histograms(smaller_slot)?;
        let smaller_best = self.search_shard(smaller_slot, true);

        let mut larger_best = SplitInfo::new();
        if larger >= 0 {
            let (larger_slot, cached) = self.inner.histogram_pool.get(larger);
            if cached {
                let is_used = self.inner.is_feature_used.clone();
                let (larger_hists, smaller_hists) =
                    self.inner.histogram_pool.slot_pair(larger_slot, smaller_slot);
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
                self.inner
                    .construct_histograms(larger, larger_slot, gradients, hessians, false);
                self.allreduce_histograms(larger_slot)?;
            }
            larger_best = self.search_shard(larger_slot, false);
        }

        let winners = allreduce_best_splits(&self.network, &[smaller_best, larger_best])?;
        self.inner.best_split_per_leaf[smaller as usize] = winners[0].clone();
        if larger >= 0 {
            self.inner.best_split_per_leaf[larger as usize] = winners[1].clone();
        }
        Ok(())
    }

    /// Sums one slot's per-feature histograms across machines.
    fn allreduce_histograms(&mut self, slot: usize) -> Result<()> {
        let hists = self.inner.histogram_pool.slot(slot);
        let total_entries: usize = hists.iter().map(|h| h.data().len()).sum();
        let mut send = vec![0u8; total_entries * ENTRY_BYTES];
        let mut offset = 0;
        for hist in hists.iter() {
            for entry in hist.data() {
                send[offset..offset + 8].copy_from_slice(&entry.sum_gradients.to_le_bytes());
                send[offset + 8..offset + 16].copy_from_slice(&entry.sum_hessians.to_le_bytes());
                send[offset + 16..offset + 20].copy_from_slice(&entry.cnt.to_le_bytes());
                offset += ENTRY_BYTES;
            }
        }
        let mut recv = vec![0u8; send.len()];
        self.network.allreduce(&send, &mut recv, &reduce_histogram_entries)?;
        let hists = self.inner.histogram_pool.slot_mut(slot);
        let mut offset = 0;
        for hist in hists.iter_mut() {
            for entry in hist.data_mut() {
                *entry = HistogramBinEntry {
                    sum_gradients: f64::from_le_bytes(recv[offset..offset + 8].try_into().unwrap()),
                    sum_hessians: f64::from_le_bytes(
                        recv[offset + 8..offset + 16].try_into().unwrap(),
                    ),
                    cnt: u32::from_le_bytes(recv[offset + 16..offset + 20].try_into().unwrap()),
                };
                offset += ENTRY_BYTES;
            }
        }
        Ok(())
    }

    /// Split search over this machine's feature shard with the global
    /// leaf sums.
    fn search_shard(&self, slot: usize, is_smaller: bool) -> SplitInfo {
        let leaf_splits = if is_smaller {
            &self.inner.smaller_leaf_splits
        } else {
            &self.inner.larger_leaf_splits
        };
        let hists = self.inner.histogram_pool.slot(slot);
        (0..self.inner.num_features)
            .into_par_iter()
            .filter(|&f| self.feature_shard[f] && self.inner.is_feature_used[f])
            .map(|f| {
                let mapper = self.inner.train_data().feature_at(f).bin_mapper();
                hists[f].find_best_threshold(
                    f as i32,
                    mapper.default_bin(),
                    leaf_splits.sum_gradients(),
                    leaf_splits.sum_hessians(),
                    leaf_splits.num_data_in_leaf(),
                    &self.inner.tree_config,
                )
            })
            .reduce(SplitInfo::new, |a, b| if b.is_better_than(&a) { b } else { a })
    }
}

/// Field-wise sum of serialized histogram entries.
fn reduce_histogram_entries(src: &[u8], dst: &mut [u8]) {
    for (s, d) in src
        .chunks_exact(ENTRY_BYTES)
        .zip(dst.chunks_exact_mut(ENTRY_BYTES))
    {
        let sg = f64::from_le_bytes(s[0..8].try_into().unwrap())
            + f64::from_le_bytes(d[0..8].try_into().unwrap());
        let sh = f64::from_le_bytes(s[8..16].try_into().unwrap())
            + f64::from_le_bytes(d[8..16].try_into().unwrap());
        let cnt = u32::from_le_bytes(s[16..20].try_into().unwrap())
            + u32::from_le_bytes(d[16..20].try_into().unwrap());
        d[0..8].copy_from_slice(&sg.to_le_bytes());
        d[8..16].copy_from_slice(&sh.to_le_bytes());
        d[16..20].copy_from_slice(&cnt.to_le_bytes());
    }
}
