//! LRU pool of per-leaf histogram sets.
//!
//! With enough capacity every leaf owns its slot directly. Otherwise a
//! leaf-to-slot map plus a monotone use counter implements
//! least-recently-used eviction; the learner needs at least two live
//! slots (smaller and larger leaf) at any time.

use crate::core::utils::common::arg_min;
use crate::treelearner::feature_histogram::FeatureHistogram;

pub struct HistogramPool {
    /// One histogram set (all features) per slot.
    pool: Vec<Vec<FeatureHistogram>>,
    cache_size: usize,
    total_size: usize,
    is_enough: bool,
    /// leaf -> slot, -1 when not cached.
    mapper: Vec<i32>,
    /// slot -> leaf, -1 when free.
    inverse_mapper: Vec<i32>,
    last_used_time: Vec<i32>,
    cur_time: i32,
}

impl HistogramPool {
    pub fn new() -> Self {
        HistogramPool {
            pool: Vec::new(),
            cache_size: 0,
            total_size: 0,
            is_enough: false,
            mapper: Vec::new(),
            inverse_mapper: Vec::new(),
            last_used_time: Vec::new(),
            cur_time: 0,
        }
    }

    /// Sizes the pool: `cache_size` slots for `total_size` leaves.
    pub fn reset(&mut self, cache_size: usize, total_size: usize) {
        let cache_size = cache_size.max(2).min(total_size);
        self.cache_size = cache_size;
        self.total_size = total_size;
        self.is_enough = cache_size == total_size;
        self.pool.clear();
        if !self.is_enough {
            self.mapper = vec![-1; total_size];
            self.inverse_mapper = vec![-1; cache_size];
            self.last_used_time = vec![0; cache_size];
            self.cur_time = 0;
        }
    }

    /// Allocates each slot's histogram set; one histogram per feature,
    /// sized by that feature's bin count.
    pub fn fill(&mut self, feature_num_bins: &[i32]) {
        self.pool = (0..self.cache_size)
            .map(|_| feature_num_bins.iter().map(|&n| FeatureHistogram::new(n)).collect())
            .collect();
    }

    /// Clears the leaf-to-slot map for a new tree.
    pub fn reset_map(&mut self) {
        if !self.is_enough {
            self.cur_time = 0;
            self.mapper.fill(-1);
            self.inverse_mapper.fill(-1);
            self.last_used_time.fill(0);
        }
    }

    /// Slot of `leaf`, and whether its cached content is still valid.
    /// On a miss the least-recently-used slot is rebound to `leaf`.
    pub fn get(&mut self, leaf: i32) -> (usize, bool) {
        if self.is_enough {
            return (leaf as usize, true);
        }
        if self.mapper[leaf as usize] >= 0 {
            let slot = self.mapper[leaf as usize] as usize;
            self.cur_time += 1;
            self.last_used_time[slot] = self.cur_time;
            return (slot, true);
        }
        let slot = arg_min(&self.last_used_time);
        self.cur_time += 1;
        self.last_used_time[slot] = self.cur_time;
        if self.inverse_mapper[slot] >= 0 {
            self.mapper[self.inverse_mapper[slot] as usize] = -1;
        }
        self.mapper[leaf as usize] = slot as i32;
        self.inverse_mapper[slot] = leaf;
        (slot, false)
    }

    /// Re-labels cached content from one leaf id to another without
    /// copying.
    pub fn move_to(&mut self, src_leaf: i32, dst_leaf: i32) {
        if self.is_enough {
            self.pool.swap(src_leaf as usize, dst_leaf as usize);
            return;
        }
        if self.mapper[src_leaf as usize] < 0 {
            return;
        }
        let slot = self.mapper[src_leaf as usize] as usize;
        self.mapper[src_leaf as usize] = -1;
        self.mapper[dst_leaf as usize] = slot as i32;
        self.cur_time += 1;
        self.last_used_time[slot] = self.cur_time;
        self.inverse_mapper[slot] = dst_leaf;
    }

    pub fn slot(&self, slot: usize) -> &Vec<FeatureHistogram> {
        &self.pool[slot]
    }

    pub fn slot_mut(&mut self, slot: usize) -> &mut Vec<FeatureHistogram> {
        &mut self.pool[slot]
    }

    /// Mutable first slot plus shared second slot, for the subtraction
    /// trick.
    pub fn slot_pair(&mut self, dst: usize, src: usize) -> (&mut Vec<FeatureHistogram>, &Vec<FeatureHistogram>) {
        assert_ne!(dst, src);
        if dst < src {
            let (a, b) = self.pool.split_at_mut(src);
            (&mut a[dst], &b[0])
        } else {
            let (a, b) = self.pool.split_at_mut(dst);
            (&mut b[0], &a[src])
        }
    }
}

impl Default for HistogramPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(cache: usize, total: usize) -> HistogramPool {
        let mut p = HistogramPool::new();
        p.reset(cache, total);
        p.fill(&[4, 8]);
        p
    }

    #[test]
    fn direct_indexing_when_capacity_suffices() {
        let mut p = pool(8, 8);
        assert_eq!(p.get(3), (3, true));
        assert_eq!(p.get(7), (7, true));
    }

    #[test]
    fn lru_evicts_the_stalest_leaf() {
        let mut p = pool(2, 8);
        let (s0, hit0) = p.get(0);
        assert!(!hit0);
        let (s1, hit1) = p.get(1);
        assert!(!hit1);
        assert_ne!(s0, s1);
        // leaf 0 refreshed, so leaf 1 is evicted next
        p.get(0);
        let (s2, hit2) = p.get(2);
        assert!(!hit2);
        assert_eq!(s2, s1);
        let (_, hit) = p.get(0);
        assert!(hit);
        let (_, hit) = p.get(1);
        assert!(!hit);
    }

    #[test]
    fn move_keeps_content_under_new_leaf() {
        let mut p = pool(2, 8);
        let (slot, _) = p.get(3);
        p.slot_mut(slot)[0].data_mut()[1].cnt = 42;
        p.move_to(3, 5);
        let (slot5, hit) = p.get(5);
        assert!(hit);
        assert_eq!(p.slot(slot5)[0].data()[1].cnt, 42);
        // old key is gone
        let (_, hit3) = p.get(3);
        assert!(!hit3);
    }

    #[test]
    fn slot_pair_borrows_two_slots() {
        let mut p = pool(4, 4);
        p.slot_mut(1)[0].data_mut()[0].cnt = 7;
        let (dst, src) = p.slot_pair(2, 1);
        assert_eq!(src[0].data()[0].cnt, 7);
        dst[0].data_mut()[0].cnt = 9;
    }
}
