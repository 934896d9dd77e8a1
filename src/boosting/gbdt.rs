//! The GBDT boosting controller: gradients, bagging, one tree per class
//! per iteration, score updates, metrics and early stopping.

use crate::config::Config;
use crate::core::error::{BoostError, Result};
use crate::core::network::Network;
use crate::core::types::{DataSize, Score};
use crate::core::utils::common::array_to_string;
use crate::core::utils::log::Log;
use crate::core::utils::random::Random;
use crate::dataset::Dataset;
use crate::io::tree::Tree;
use crate::metrics::Metric;
use crate::objective::ObjectiveFunction;
use crate::boosting::score_updater::ScoreUpdater;
use crate::treelearner::TreeLearner;
use std::sync::Arc;

pub struct Gbdt {
    pub(crate) iter: i32,
    pub(crate) num_iterations: i32,
    pub(crate) num_class: i32,
    pub(crate) learning_rate: f64,
    bagging_fraction: f64,
    bagging_freq: i32,
    pub(crate) early_stopping_round: i32,
    output_freq: i32,
    pub(crate) num_data: DataSize,
    pub(crate) max_feature_idx: i32,
    pub(crate) label_idx: i32,
    pub(crate) sigmoid: f64,
    pub(crate) train_data: Option<Arc<Dataset>>,
    pub(crate) objective: Option<ObjectiveFunction>,
    pub(crate) tree_learners: Vec<TreeLearner>,
    pub(crate) models: Vec<Tree>,
    pub(crate) train_score_updater: Option<ScoreUpdater>,
    pub(crate) valid_score_updaters: Vec<ScoreUpdater>,
    training_metrics: Vec<Metric>,
    valid_metrics: Vec<Vec<Metric>>,
    best_iter: Vec<Vec<i32>>,
    best_score: Vec<Vec<f64>>,
    pub(crate) gradients: Vec<Score>,
    pub(crate) hessians: Vec<Score>,
    bag_data_indices: Vec<DataSize>,
    oob_data_indices: Vec<DataSize>,
    random: Random,
    feature_names: Vec<String>,
}

impl Gbdt {
    pub fn new() -> Self {
        Gbdt {
            iter: 0,
            num_iterations: 0,
            num_class: 1,
            learning_rate: 0.1,
            bagging_fraction: 1.0,
            bagging_freq: 0,
            early_stopping_round: 0,
            output_freq: 1,
            num_data: 0,
            max_feature_idx: 0,
            label_idx: 0,
            sigmoid: -1.0,
            train_data: None,
            objective: None,
            tree_learners: Vec::new(),
            models: Vec::new(),
            train_score_updater: None,
            valid_score_updaters: Vec::new(),
            training_metrics: Vec::new(),
            valid_metrics: Vec::new(),
            best_iter: Vec::new(),
            best_score: Vec::new(),
            gradients: Vec::new(),
            hessians: Vec::new(),
            bag_data_indices: Vec::new(),
            oob_data_indices: Vec::new(),
            random: Random::with_seed(3),
            feature_names: Vec::new(),
        }
    }

    pub fn init(
        &mut self,
        config: &Config,
        train_data: Arc<Dataset>,
        mut objective: ObjectiveFunction,
        training_metrics: Vec<Metric>,
        network: Arc<Network>,
    ) -> Result<()> {
        let boosting = &config.boosting;
        objective.init(train_data.metadata())?;
        self.num_class = objective.num_tree_per_iteration();
        self.num_iterations = boosting.num_iterations;
        self.learning_rate = boosting.learning_rate;
        self.bagging_fraction = boosting.bagging_fraction;
        self.bagging_freq = boosting.bagging_freq;
        self.early_stopping_round = boosting.early_stopping_round;
        self.output_freq = config.metric.output_freq.max(1);
        self.num_data = train_data.num_data();
        self.max_feature_idx = train_data.num_total_features() - 1;
        self.label_idx = train_data.label_idx();
        self.sigmoid = objective.sigmoid();
        self.random = Random::with_seed(boosting.bagging_seed);
        self.feature_names = train_data.feature_names().to_vec();

        self.tree_learners = (0..self.num_class)
            .map(|_| {
                TreeLearner::create(
                    boosting.tree_learner_type,
                    &boosting.tree,
                    train_data.clone(),
                    network.clone(),
                )
            })
            .collect();

        let mut training_metrics = training_metrics;
        for metric in training_metrics.iter_mut() {
            metric.init(train_data.metadata())?;
        }
        self.training_metrics = training_metrics;

        self.train_score_updater = Some(ScoreUpdater::new(train_data.clone(), self.num_class));
        let buf = self.num_data as usize * self.num_class as usize;
        self.gradients = vec![0.0; buf];
        self.hessians = vec![0.0; buf];
        self.objective = Some(objective);
        self.train_data = Some(train_data);
        Ok(())
    }

    /// Registers a validation dataset plus the metrics evaluated on it.
    pub fn add_valid_data(
        &mut self,
        valid_data: Arc<Dataset>,
        mut metrics: Vec<Metric>,
    ) -> Result<()> {
        for metric in metrics.iter_mut() {
            metric.init(valid_data.metadata())?;
        }
        self.valid_score_updaters
            .push(ScoreUpdater::new(valid_data, self.num_class));
        self.best_iter.push(vec![0; metrics.len()]);
        self.best_score.push(vec![-1.0; metrics.len()]);
        self.valid_metrics.push(metrics);
        Ok(())
    }

    /// Runs the full training loop.
    pub fn train(&mut self) -> Result<()> {
        for _ in 0..self.num_iterations {
            if self.train_one_iter(None, None, true)? {
                break;
            }
        }
        Ok(())
    }

    /// One boosting iteration; returns true when training should stop.
    pub fn train_one_iter(
        &mut self,
        gradients: Option<&[Score]>,
        hessians: Option<&[Score]>,
        is_eval: bool,
    ) -> Result<bool> {
        match (gradients, hessians) {
            (Some(g), Some(h)) => {
                self.gradients.copy_from_slice(g);
                self.hessians.copy_from_slice(h);
            }
            _ => self.boost()?,
        }
        if self.train_classes(None)? {
            return Ok(true);
        }
        let met_early_stopping = if is_eval { self.output_metric(self.iter + 1) } else { false };
        self.iter += 1;
        if met_early_stopping {
            self.finish_early_stopping();
        }
        Ok(met_early_stopping)
    }

    /// Computes gradients from the current training scores.
    pub(crate) fn boost(&mut self) -> Result<()> {
        let objective = self
            .objective
            .as_ref()
            .ok_or_else(|| BoostError::training("no objective function provided"))?;
        let updater = self
            .train_score_updater
            .as_ref()
            .ok_or_else(|| BoostError::training("boosting is not initialised"))?;
        objective.get_gradients(updater.score(), &mut self.gradients, &mut self.hessians);
        Ok(())
    }

    /// Trains one tree per class. `shrinkage` overrides the learning
    /// rate when set (DART passes its `1/(1+k)` rate). Returns true when
    /// no tree could be grown.
    pub(crate) fn train_classes(&mut self, shrinkage: Option<f64>) -> Result<bool> {
        let n = self.num_data as usize;
        for class in 0..self.num_class as usize {
            self.bagging(self.iter, class);
            let g = &self.gradients[class * n..(class + 1) * n];
            let h = &self.hessians[class * n..(class + 1) * n];
            let mut tree = self.tree_learners[class].train(g, h)?;
            if tree.num_leaves() <= 1 {
                if self.iter == 0 && class == 0 && self.models.is_empty() {
                    return Err(BoostError::training(
                        "no valid split in the first iteration; \
                         check min_data_in_leaf and min_sum_hessian_in_leaf against the data",
                    ));
                }
                // roll back this iteration's earlier classes so the model
                // keeps one tree per class per iteration
                for c in (0..class).rev() {
                    if let Some(mut dropped) = self.models.pop() {
                        dropped.shrinkage(-1.0);
                        let updater = self.train_score_updater.as_mut().unwrap();
                        updater.add_score_by_tree(&dropped, c);
                        for valid in self.valid_score_updaters.iter_mut() {
                            valid.add_score_by_tree(&dropped, c);
                        }
                    }
                }
                Log::info("stopped training: no leaf meets the split requirements");
                return Ok(true);
            }
            tree.shrinkage(shrinkage.unwrap_or(self.learning_rate));
            self.update_score(&tree, class);
            self.update_score_out_of_bag(&tree, class);
            self.models.push(tree);
        }
        Ok(false)
    }

    /// Per-class bagging; whole queries are the sampling unit when the
    /// dataset has them.
    fn bagging(&mut self, iter: i32, class: usize) {
        if !(self.bagging_fraction < 1.0 && self.bagging_freq > 0) {
            return;
        }
        if iter % self.bagging_freq != 0 {
            return;
        }
        let train_data = self.train_data.as_ref().unwrap();
        self.bag_data_indices.clear();
        self.oob_data_indices.clear();
        match train_data.metadata().query_boundaries() {
            None => {
                let bag_cnt = (self.bagging_fraction * self.num_data as f64) as DataSize;
                let mut cur_left = 0;
                for i in 0..self.num_data {
                    let prob = (bag_cnt - cur_left) as f64 / (self.num_data - i) as f64;
                    if self.random.next_double() < prob {
                        self.bag_data_indices.push(i);
                        cur_left += 1;
                    } else {
                        self.oob_data_indices.push(i);
                    }
                }
            }
            Some(boundaries) => {
                let num_queries = boundaries.len() - 1;
                let bag_query_cnt = (num_queries as f64 * self.bagging_fraction) as usize;
                let mut cur_left_queries = 0;
                for q in 0..num_queries {
                    let prob =
                        (bag_query_cnt - cur_left_queries) as f64 / (num_queries - q) as f64;
                    if self.random.next_double() < prob {
                        self.bag_data_indices
                            .extend(boundaries[q]..boundaries[q + 1]);
                        cur_left_queries += 1;
                    } else {
                        self.oob_data_indices
                            .extend(boundaries[q]..boundaries[q + 1]);
                    }
                }
            }
        }
        Log::info(&format!(
            "re-bagging, using {} rows to train",
            self.bag_data_indices.len()
        ));
        self.tree_learners[class].set_bagging_data(&self.bag_data_indices);
    }

    fn update_score(&mut self, tree: &Tree, class: usize) {
        let updater = self.train_score_updater.as_mut().unwrap();
        updater.add_score_by_learner(&self.tree_learners[class], tree, class);
        for valid in self.valid_score_updaters.iter_mut() {
            valid.add_score_by_tree(tree, class);
        }
    }

    /// Out-of-bag rows see the tree through the slow traversal path so
    /// the next iteration's gradients cover every row.
    fn update_score_out_of_bag(&mut self, tree: &Tree, class: usize) {
        if self.oob_data_indices.is_empty() {
            return;
        }
        self.train_score_updater.as_mut().unwrap().add_score_by_indices(
            tree,
            &self.oob_data_indices,
            class,
        );
    }

    /// Prints due metrics and checks early stopping. Returns true when
    /// no validation metric improved for `early_stopping_round`
    /// iterations.
    pub(crate) fn output_metric(&mut self, iter: i32) -> bool {
        let print_now = iter % self.output_freq == 0;
        if print_now {
            if let Some(updater) = &self.train_score_updater {
                for metric in &self.training_metrics {
                    let scores = metric.eval(updater.score());
                    Log::info(&format!(
                        "iteration {}, training {}: {}",
                        iter,
                        metric.name(),
                        array_to_string(&scores, ' ')
                    ));
                }
            }
        }
        let mut met = false;
        if print_now || self.early_stopping_round > 0 {
            for (v, (metrics, updater)) in self
                .valid_metrics
                .iter()
                .zip(self.valid_score_updaters.iter())
                .enumerate()
            {
                for (m, metric) in metrics.iter().enumerate() {
                    let scores = metric.eval(updater.score());
                    if print_now {
                        Log::info(&format!(
                            "iteration {}, valid_{} {}: {}",
                            iter,
                            v + 1,
                            metric.name(),
                            array_to_string(&scores, ' ')
                        ));
                    }
                    if self.early_stopping_round > 0 {
                        let last = *scores.last().unwrap();
                        let bigger_better = metric.is_bigger_better();
                        let best = self.best_score[v][m];
                        let improved = best < 0.0
                            || (!bigger_better && last < best)
                            || (bigger_better && last > best);
                        if improved {
                            self.best_score[v][m] = last;
                            self.best_iter[v][m] = iter;
                        } else if !met && iter - self.best_iter[v][m] >= self.early_stopping_round
                        {
                            met = true;
                        }
                    }
                }
            }
        }
        met
    }

    fn finish_early_stopping(&mut self) {
        let drop = (self.early_stopping_round * self.num_class) as usize;
        let keep = self.models.len().saturating_sub(drop);
        self.models.truncate(keep);
        Log::info(&format!(
            "early stopping at iteration {}, best iteration is {}",
            self.iter,
            self.iter - self.early_stopping_round
        ));
    }

    /// Current evaluation lines, one per metric and dataset.
    pub fn eval_current(&self, include_training: bool) -> Vec<String> {
        let mut out = Vec::new();
        if include_training {
            if let Some(updater) = &self.train_score_updater {
                for metric in &self.training_metrics {
                    out.push(format!(
                        "{} : {}",
                        metric.name(),
                        array_to_string(&metric.eval(updater.score()), ' ')
                    ));
                }
            }
        }
        for (metrics, updater) in self.valid_metrics.iter().zip(self.valid_score_updaters.iter()) {
            for metric in metrics {
                out.push(format!(
                    "{} : {}",
                    metric.name(),
                    array_to_string(&metric.eval(updater.score()), ' ')
                ));
            }
        }
        out
    }

    pub fn models(&self) -> &[Tree] {
        &self.models
    }

    /// Completed boosting iterations.
    pub fn current_iteration(&self) -> i32 {
        self.iter
    }

    pub fn num_class(&self) -> i32 {
        self.num_class
    }

    pub fn sigmoid(&self) -> f64 {
        self.sigmoid
    }

    pub fn max_feature_idx(&self) -> i32 {
        self.max_feature_idx
    }

    pub fn train_scores(&self) -> Option<&[Score]> {
        self.train_score_updater.as_ref().map(|u| u.score())
    }

    /// Serialises header, trees and feature importances to the model
    /// text format.
    pub(crate) fn model_to_string(&self, kind: &str) -> String {
        let mut out = String::new();
        out.push_str(kind);
        out.push('\n');
        out.push_str(&format!("num_class={}\n", self.num_class));
        out.push_str(&format!("label_index={}\n", self.label_idx));
        out.push_str(&format!("max_feature_idx={}\n", self.max_feature_idx));
        out.push_str(&format!("sigmoid={}\n", self.sigmoid));
        out.push('\n');
        for (i, tree) in self.models.iter().enumerate() {
            out.push_str(&format!("Tree={}\n", i));
            out.push_str(&tree.to_string_block());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.feature_importance());
        out
    }

    /// Split counts per raw feature, most used first.
    pub fn feature_importance(&self) -> String {
        let mut counts = vec![0usize; (self.max_feature_idx + 1).max(1) as usize];
        for tree in &self.models {
            for node in 0..tree.num_leaves() - 1 {
                let f = tree.split_feature_real(node);
                if f >= 0 && (f as usize) < counts.len() {
                    counts[f as usize] += 1;
                }
            }
        }
        let mut pairs: Vec<(usize, String)> = counts
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let name = self
                    .feature_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("Column_{}", i));
                (c, name)
            })
            .collect();
        pairs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        let mut out = String::from("feature importances:\n");
        for (count, name) in pairs {
            out.push_str(&format!("{}={}\n", name, count));
        }
        out
    }

    /// Restores header fields and trees from model text (without the
    /// kind line).
    pub(crate) fn models_from_string(&mut self, model_str: &str) -> Result<()> {
        let mut num_class: Option<i32> = None;
        let mut label_idx: Option<i32> = None;
        let mut max_feature_idx: Option<i32> = None;
        let mut sigmoid: f64 = -1.0;
        for line in model_str.lines() {
            if let Some(v) = line.strip_prefix("num_class=") {
                num_class = v.trim().parse().ok();
            } else if let Some(v) = line.strip_prefix("label_index=") {
                label_idx = v.trim().parse().ok();
            } else if let Some(v) = line.strip_prefix("max_feature_idx=") {
                max_feature_idx = v.trim().parse().ok();
            } else if let Some(v) = line.strip_prefix("sigmoid=") {
                sigmoid = v.trim().parse().unwrap_or(-1.0);
            } else if line.starts_with("Tree=") {
                break;
            }
        }
        self.num_class = num_class
            .ok_or_else(|| BoostError::model("model file does not specify the number of classes"))?;
        self.label_idx = label_idx
            .ok_or_else(|| BoostError::model("model file does not specify the label index"))?;
        self.max_feature_idx = max_feature_idx
            .ok_or_else(|| BoostError::model("model file does not specify max_feature_idx"))?;
        self.sigmoid = sigmoid;

        self.models.clear();
        let lines: Vec<&str> = model_str.lines().collect();
        let mut i = 0;
        while i < lines.len() {
            if lines[i].starts_with("Tree=") {
                let start = i + 1;
                let mut end = start;
                while end < lines.len()
                    && !lines[end].starts_with("Tree=")
                    && !lines[end].starts_with("feature importances:")
                {
                    end += 1;
                }
                let block = lines[start..end].join("\n");
                self.models.push(Tree::from_string_block(&block)?);
                i = end;
            } else {
                i += 1;
            }
        }
        Log::info(&format!("finished loading {} models", self.models.len()));
        if self.num_class > 0 && self.models.len() % self.num_class as usize != 0 {
            return Err(BoostError::model(format!(
                "model has {} trees, not a multiple of num_class {}",
                self.models.len(),
                self.num_class
            )));
        }
        Ok(())
    }

    /// Raw single-class score of one row.
    pub fn predict_raw(&self, features: &[f64]) -> f64 {
        self.models.iter().map(|t| t.predict(features)).sum()
    }

    /// Single-class score with the sigmoid transform when the model
    /// carries one.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let raw = self.predict_raw(features);
        if self.sigmoid > 0.0 {
            1.0 / (1.0 + (-2.0 * self.sigmoid * raw).exp())
        } else {
            raw
        }
    }

    /// Per-class raw scores of one row.
    pub fn predict_multiclass(&self, features: &[f64]) -> Vec<f64> {
        let k = self.num_class.max(1) as usize;
        let mut out = vec![0.0; k];
        for (i, tree) in self.models.iter().enumerate() {
            out[i % k] += tree.predict(features);
        }
        out
    }

    /// Leaf index per tree for one row.
    pub fn predict_leaf_index(&self, features: &[f64]) -> Vec<i32> {
        self.models.iter().map(|t| t.predict_leaf_index(features)).collect()
    }
}

impl Default for Gbdt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metric;
    use crate::objective::ObjectiveFunction;
    use ndarray::Array2;

    fn query_gbdt(bagging_fraction: f64) -> Gbdt {
        let n = 30;
        let features = Array2::from_shape_fn((n, 1), |(r, _)| (r % 7) as f64);
        let labels: Vec<f32> = (0..n).map(|r| (r % 2) as f32).collect();
        let mut data = Dataset::from_matrix(features.view(), &labels, 16, true, 1).unwrap();
        data.metadata_mut()
            .set_query_boundaries(vec![0, 10, 20, 30])
            .unwrap();
        let mut config = Config::default();
        config.io.data_filename = "unused".to_string();
        config.boosting.bagging_fraction = bagging_fraction;
        config.boosting.bagging_freq = 1;
        config.boosting.tree.min_data_in_leaf = 1;
        config.boosting.tree.min_sum_hessian_in_leaf = 0.0;
        let objective = ObjectiveFunction::create(config.objective_type, &config.objective);
        let mut gbdt = Gbdt::new();
        gbdt.init(
            &config,
            Arc::new(data),
            objective,
            Vec::<Metric>::new(),
            Arc::new(Network::single_machine()),
        )
        .unwrap();
        gbdt
    }

    #[test]
    fn bagging_samples_whole_queries() {
        let mut gbdt = query_gbdt(2.0 / 3.0);
        for iter in 0..5 {
            gbdt.bagging(iter, 0);
            // exactly two of the three queries, never a partial one
            assert_eq!(gbdt.bag_data_indices.len(), 20);
            assert_eq!(gbdt.oob_data_indices.len(), 10);
            for bounds in [(0, 10), (10, 20), (20, 30)] {
                let in_bag = gbdt
                    .bag_data_indices
                    .iter()
                    .filter(|&&r| r >= bounds.0 && r < bounds.1)
                    .count();
                assert!(in_bag == 0 || in_bag == 10, "query split across bag and oob");
            }
        }
    }

    #[test]
    fn bagging_is_reproducible_per_seed() {
        let mut a = query_gbdt(2.0 / 3.0);
        let mut b = query_gbdt(2.0 / 3.0);
        for iter in 0..3 {
            a.bagging(iter, 0);
            b.bagging(iter, 0);
            assert_eq!(a.bag_data_indices, b.bag_data_indices);
        }
    }
}
