//! DART boosting: drop a random subset of existing trees, train against
//! the reduced ensemble, then normalise so the dropped trees end up at
//! `k/(k+1)` of their old contribution and the new tree at `1/(k+1)`.

use crate::config::Config;
use crate::core::constants::K_EPSILON;
use crate::core::error::Result;
use crate::core::network::Network;
use crate::core::types::Score;
use crate::core::utils::random::Random;
use crate::dataset::Dataset;
use crate::metrics::Metric;
use crate::objective::ObjectiveFunction;
use crate::boosting::gbdt::Gbdt;
use std::sync::Arc;

pub struct Dart {
    pub(crate) gbdt: Gbdt,
    drop_rate: f64,
    shrinkage_rate: f64,
    random_for_drop: Random,
    /// Dropped iteration indices of the current round.
    drop_index: Vec<usize>,
}

impl Dart {
    pub fn new() -> Self {
        Dart {
            gbdt: Gbdt::new(),
            drop_rate: 0.1,
            shrinkage_rate: 1.0,
            random_for_drop: Random::with_seed(4),
            drop_index: Vec::new(),
        }
    }

    pub fn init(
        &mut self,
        config: &Config,
        train_data: Arc<Dataset>,
        objective: ObjectiveFunction,
        training_metrics: Vec<Metric>,
        network: Arc<Network>,
    ) -> Result<()> {
        self.gbdt
            .init(config, train_data, objective, training_metrics, network)?;
        self.drop_rate = config.boosting.drop_rate;
        self.shrinkage_rate = 1.0;
        self.random_for_drop = Random::with_seed(config.boosting.drop_seed);
        Ok(())
    }

    pub fn add_valid_data(
        &mut self,
        valid_data: Arc<Dataset>,
        metrics: Vec<Metric>,
    ) -> Result<()> {
        self.gbdt.add_valid_data(valid_data, metrics)
    }

    pub fn train(&mut self) -> Result<()> {
        for _ in 0..self.gbdt.num_iterations {
            if self.train_one_iter(None, None, true)? {
                break;
            }
        }
        Ok(())
    }

    /// One DART iteration: drop, boost, train, update scores, normalise.
    pub fn train_one_iter(
        &mut self,
        gradients: Option<&[Score]>,
        hessians: Option<&[Score]>,
        is_eval: bool,
    ) -> Result<bool> {
        match (gradients, hessians) {
            (Some(g), Some(h)) => {
                self.dropping_trees();
                self.gbdt.gradients.copy_from_slice(g);
                self.gbdt.hessians.copy_from_slice(h);
            }
            _ => {
                // gradients must see the ensemble with the drop applied
                self.dropping_trees();
                self.gbdt.boost()?;
            }
        }
        if self.gbdt.train_classes(Some(self.shrinkage_rate))? {
            return Ok(true);
        }
        // out-of-bag updates happened inside train_classes, before this
        self.normalize();
        let met_early_stopping = if is_eval {
            self.gbdt.output_metric(self.gbdt.iter + 1)
        } else {
            false
        };
        self.gbdt.iter += 1;
        if met_early_stopping {
            let drop = (self.gbdt.early_stopping_round * self.gbdt.num_class) as usize;
            let keep = self.gbdt.models.len().saturating_sub(drop);
            self.gbdt.models.truncate(keep);
        }
        Ok(met_early_stopping)
    }

    /// Selects the drop set and removes its contribution from the
    /// training scores. At least one tree is dropped whenever the
    /// Bernoulli pass selects none and trees exist.
    fn dropping_trees(&mut self) {
        self.drop_index.clear();
        if self.drop_rate > K_EPSILON {
            for i in 0..self.gbdt.iter as usize {
                if self.random_for_drop.next_double() < self.drop_rate {
                    self.drop_index.push(i);
                }
            }
        }
        if self.drop_index.is_empty() {
            self.drop_index = self
                .random_for_drop
                .sample(self.gbdt.iter, 1)
                .into_iter()
                .map(|v| v as usize)
                .collect();
        }
        let num_class = self.gbdt.num_class as usize;
        for &i in &self.drop_index {
            for class in 0..num_class {
                let t = i * num_class + class;
                let models = &mut self.gbdt.models;
                models[t].shrinkage(-1.0);
                let updater = self.gbdt.train_score_updater.as_mut().unwrap();
                updater.add_score_by_tree(&models[t], class);
            }
        }
        self.shrinkage_rate = 1.0 / (1.0 + self.drop_index.len() as f64);
    }

    /// Restores the dropped trees at `k/(k+1)` scale: validation scores
    /// first, then the training scores.
    fn normalize(&mut self) {
        let k = self.drop_index.len() as f64;
        let num_class = self.gbdt.num_class as usize;
        for &i in &self.drop_index {
            for class in 0..num_class {
                let t = i * num_class + class;
                // -v becomes -v/(1+k); validation gains v*k/(1+k)
                self.gbdt.models[t].shrinkage(self.shrinkage_rate);
                for updater in self.gbdt.valid_score_updaters.iter_mut() {
                    updater.add_score_by_tree(&self.gbdt.models[t], class);
                }
                // then flips to v*k/(1+k); training regains the same
                self.gbdt.models[t].shrinkage(-k);
                let updater = self.gbdt.train_score_updater.as_mut().unwrap();
                updater.add_score_by_tree(&self.gbdt.models[t], class);
            }
        }
    }

    pub fn gbdt(&self) -> &Gbdt {
        &self.gbdt
    }
}

impl Default for Dart {
    fn default() -> Self {
        Self::new()
    }
}
