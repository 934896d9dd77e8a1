//! Configuration for every stage of the pipeline.
//!
//! All parameters arrive as `key=value` string pairs (command line or
//! config file), are alias-normalised, parsed into the typed structs
//! below and validated before anything else runs. A conflict or unknown
//! value here is fatal before training starts.

mod aliases;

pub use aliases::ParameterAlias;

use crate::core::error::{BoostError, Result};
use crate::core::types::{BoostingType, MetricType, ObjectiveType, TaskType, TreeLearnerType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Input/output and data-loading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    pub max_bin: i32,
    pub bin_construct_sample_cnt: i32,
    pub data_random_seed: i32,
    pub data_filename: String,
    pub valid_data_filenames: Vec<String>,
    pub output_model: String,
    pub output_result: String,
    pub input_model: String,
    pub input_init_score: String,
    pub is_pre_partition: bool,
    pub is_enable_sparse: bool,
    pub use_two_round_loading: bool,
    pub is_save_binary_file: bool,
    /// Apply the objective's output transform when predicting.
    pub is_sigmoid: bool,
    pub has_header: bool,
    /// Label column, by index or `name:` prefix. Empty means column 0.
    pub label_column: String,
    pub weight_column: String,
    pub group_column: String,
    pub ignore_columns: Vec<String>,
    /// LIBSVM keys are 1-based when set (the common convention).
    pub sparse_one_based: bool,
    /// Output leaf indices instead of scores when predicting.
    pub predict_leaf_index: bool,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            max_bin: crate::core::constants::DEFAULT_MAX_BIN,
            bin_construct_sample_cnt: crate::core::constants::DEFAULT_BIN_CONSTRUCT_SAMPLE_CNT,
            data_random_seed: 1,
            data_filename: String::new(),
            valid_data_filenames: Vec::new(),
            output_model: "histboost_model.txt".to_string(),
            output_result: "histboost_predict_result.txt".to_string(),
            input_model: String::new(),
            input_init_score: String::new(),
            is_pre_partition: false,
            is_enable_sparse: true,
            use_two_round_loading: false,
            is_save_binary_file: false,
            is_sigmoid: true,
            has_header: false,
            label_column: String::new(),
            weight_column: String::new(),
            group_column: String::new(),
            ignore_columns: Vec::new(),
            sparse_one_based: true,
            predict_leaf_index: false,
        }
    }
}

/// Objective function parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveConfig {
    pub sigmoid: f64,
    /// Per-label gain for lambdarank and ndcg; defaults to `2^i - 1`.
    pub label_gain: Vec<f64>,
    pub max_position: i32,
    pub is_unbalance: bool,
    pub num_class: i32,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        ObjectiveConfig {
            sigmoid: 1.0,
            label_gain: Vec::new(),
            max_position: 20,
            is_unbalance: false,
            num_class: 1,
        }
    }
}

impl ObjectiveConfig {
    /// Label gain table, filled with the `2^i - 1` default when unset.
    pub fn label_gain_or_default(&self, max_label: usize) -> Vec<f64> {
        if !self.label_gain.is_empty() {
            return self.label_gain.clone();
        }
        (0..=max_label.max(31))
            .map(|i| (2f64).powi(i as i32) - 1.0)
            .collect()
    }
}

/// Metric evaluation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    pub output_freq: i32,
    pub sigmoid: f64,
    pub label_gain: Vec<f64>,
    /// NDCG evaluation positions.
    pub eval_at: Vec<i32>,
    pub num_class: i32,
    pub is_training_metric: bool,
}

impl Default for MetricConfig {
    fn default() -> Self {
        MetricConfig {
            output_freq: 1,
            sigmoid: 1.0,
            label_gain: Vec::new(),
            eval_at: vec![1, 2, 3, 4, 5],
            num_class: 1,
            is_training_metric: false,
        }
    }
}

/// Tree growth parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    pub num_leaves: i32,
    pub min_data_in_leaf: i32,
    pub min_sum_hessian_in_leaf: f64,
    pub feature_fraction: f64,
    pub feature_fraction_seed: i32,
    /// L2 regularisation on leaf outputs.
    pub lambda_l2: f64,
    /// Minimal gain a split must clear.
    pub min_gain_to_split: f64,
    /// Cached leaf histogram sets; -1 keeps one slot per leaf.
    pub histogram_pool_size: i32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            num_leaves: 127,
            min_data_in_leaf: 100,
            min_sum_hessian_in_leaf: 10.0,
            feature_fraction: 1.0,
            feature_fraction_seed: 2,
            lambda_l2: 0.0,
            min_gain_to_split: 0.0,
            histogram_pool_size: -1,
        }
    }
}

/// Boosting loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub num_iterations: i32,
    pub learning_rate: f64,
    pub bagging_fraction: f64,
    pub bagging_freq: i32,
    pub bagging_seed: i32,
    pub early_stopping_round: i32,
    pub drop_rate: f64,
    pub drop_seed: i32,
    pub boosting_type: BoostingType,
    pub tree_learner_type: TreeLearnerType,
    pub tree: TreeConfig,
    pub num_class: i32,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        BoostingConfig {
            num_iterations: 10,
            learning_rate: 0.1,
            bagging_fraction: 1.0,
            bagging_freq: 0,
            bagging_seed: 3,
            early_stopping_round: 0,
            drop_rate: 0.1,
            drop_seed: 4,
            boosting_type: BoostingType::Gbdt,
            tree_learner_type: TreeLearnerType::Serial,
            tree: TreeConfig::default(),
            num_class: 1,
        }
    }
}

/// Distributed training parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub num_machines: i32,
    pub local_listen_port: i32,
    /// Allreduce wall-clock timeout in minutes.
    pub time_out: i32,
    pub machine_list_filename: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            num_machines: 1,
            local_listen_port: 12400,
            time_out: 120,
            machine_list_filename: String::new(),
        }
    }
}

/// Full configuration aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub task: TaskType,
    pub objective_type: ObjectiveType,
    pub metric_types: Vec<MetricType>,
    pub num_threads: i32,
    /// Log level: -1 fatal, 0 warning, 1 info, 2 debug.
    pub verbosity: i32,
    pub io: IoConfig,
    pub objective: ObjectiveConfig,
    pub metric: MetricConfig,
    pub boosting: BoostingConfig,
    pub network: NetworkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            task: TaskType::Train,
            objective_type: ObjectiveType::Regression,
            metric_types: Vec::new(),
            num_threads: 0,
            verbosity: 1,
            io: IoConfig::default(),
            objective: ObjectiveConfig::default(),
            metric: MetricConfig::default(),
            boosting: BoostingConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Config {
    /// Builds and validates a configuration from alias-normalised
    /// `key=value` pairs.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut config = Config::default();
        config.set(params)?;
        config.check()?;
        Ok(config)
    }

    fn set(&mut self, params: &HashMap<String, String>) -> Result<()> {
        if let Some(v) = params.get("task") {
            self.task = TaskType::parse(v)?;
        }
        if let Some(v) = params.get("objective") {
            self.objective_type = ObjectiveType::parse(v)?;
        }
        if let Some(v) = params.get("metric") {
            self.metric_types = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| MetricType::parse(s.trim()))
                .collect::<Result<Vec<_>>>()?;
        }
        get_i32(params, "num_threads", &mut self.num_threads)?;
        get_i32(params, "verbosity", &mut self.verbosity)?;

        // io
        get_i32(params, "max_bin", &mut self.io.max_bin)?;
        get_i32(params, "bin_construct_sample_cnt", &mut self.io.bin_construct_sample_cnt)?;
        get_i32(params, "data_random_seed", &mut self.io.data_random_seed)?;
        get_string(params, "data", &mut self.io.data_filename);
        if let Some(v) = params.get("valid_data") {
            self.io.valid_data_filenames = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        get_string(params, "output_model", &mut self.io.output_model);
        get_string(params, "output_result", &mut self.io.output_result);
        get_string(params, "input_model", &mut self.io.input_model);
        get_string(params, "input_init_score", &mut self.io.input_init_score);
        get_bool(params, "is_pre_partition", &mut self.io.is_pre_partition)?;
        get_bool(params, "is_enable_sparse", &mut self.io.is_enable_sparse)?;
        get_bool(params, "use_two_round_loading", &mut self.io.use_two_round_loading)?;
        get_bool(params, "is_save_binary_file", &mut self.io.is_save_binary_file)?;
        get_bool(params, "is_sigmoid", &mut self.io.is_sigmoid)?;
        get_bool(params, "has_header", &mut self.io.has_header)?;
        get_string(params, "label_column", &mut self.io.label_column);
        get_string(params, "weight_column", &mut self.io.weight_column);
        get_string(params, "group_column", &mut self.io.group_column);
        if let Some(v) = params.get("ignore_column") {
            self.io.ignore_columns = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        get_bool(params, "sparse_one_based", &mut self.io.sparse_one_based)?;
        get_bool(params, "predict_leaf_index", &mut self.io.predict_leaf_index)?;

        // objective / metric shared
        let mut sigmoid = 1.0;
        if get_f64(params, "sigmoid", &mut sigmoid)? {
            self.objective.sigmoid = sigmoid;
            self.metric.sigmoid = sigmoid;
        }
        if let Some(v) = params.get("label_gain") {
            let gains = parse_f64_list(v, "label_gain")?;
            self.objective.label_gain = gains.clone();
            self.metric.label_gain = gains;
        }
        get_i32(params, "max_position", &mut self.objective.max_position)?;
        get_bool(params, "is_unbalance", &mut self.objective.is_unbalance)?;
        let mut num_class = 1;
        if get_i32(params, "num_class", &mut num_class)? {
            self.objective.num_class = num_class;
            self.metric.num_class = num_class;
            self.boosting.num_class = num_class;
        }
        get_i32(params, "output_freq", &mut self.metric.output_freq)?;
        if let Some(v) = params.get("eval_at") {
            self.metric.eval_at = parse_f64_list(v, "eval_at")?
                .into_iter()
                .map(|x| x as i32)
                .collect();
        }
        get_bool(params, "is_training_metric", &mut self.metric.is_training_metric)?;

        // tree
        get_i32(params, "num_leaves", &mut self.boosting.tree.num_leaves)?;
        get_i32(params, "min_data_in_leaf", &mut self.boosting.tree.min_data_in_leaf)?;
        get_f64(params, "min_sum_hessian_in_leaf", &mut self.boosting.tree.min_sum_hessian_in_leaf)?;
        get_f64(params, "feature_fraction", &mut self.boosting.tree.feature_fraction)?;
        get_i32(params, "feature_fraction_seed", &mut self.boosting.tree.feature_fraction_seed)?;
        get_f64(params, "lambda_l2", &mut self.boosting.tree.lambda_l2)?;
        get_f64(params, "min_gain_to_split", &mut self.boosting.tree.min_gain_to_split)?;
        get_i32(params, "histogram_pool_size", &mut self.boosting.tree.histogram_pool_size)?;

        // boosting
        get_i32(params, "num_iterations", &mut self.boosting.num_iterations)?;
        get_f64(params, "learning_rate", &mut self.boosting.learning_rate)?;
        get_f64(params, "bagging_fraction", &mut self.boosting.bagging_fraction)?;
        get_i32(params, "bagging_freq", &mut self.boosting.bagging_freq)?;
        get_i32(params, "bagging_seed", &mut self.boosting.bagging_seed)?;
        get_i32(params, "early_stopping_round", &mut self.boosting.early_stopping_round)?;
        get_f64(params, "drop_rate", &mut self.boosting.drop_rate)?;
        get_i32(params, "drop_seed", &mut self.boosting.drop_seed)?;
        if let Some(v) = params.get("boosting") {
            self.boosting.boosting_type = BoostingType::parse(v)?;
        }
        if let Some(v) = params.get("tree_learner") {
            self.boosting.tree_learner_type = TreeLearnerType::parse(v)?;
        }

        // network
        get_i32(params, "num_machines", &mut self.network.num_machines)?;
        get_i32(params, "local_listen_port", &mut self.network.local_listen_port)?;
        get_i32(params, "time_out", &mut self.network.time_out)?;
        get_string(params, "machine_list_file", &mut self.network.machine_list_filename);
        Ok(())
    }

    /// Cross-parameter validation; every failure here is fatal before
    /// any data is touched.
    fn check(&self) -> Result<()> {
        let t = &self.boosting.tree;
        if self.io.max_bin < 2 {
            return Err(BoostError::invalid_parameter(
                "max_bin",
                self.io.max_bin.to_string(),
                "must be at least 2",
            ));
        }
        if t.num_leaves < 2 {
            return Err(BoostError::invalid_parameter(
                "num_leaves",
                t.num_leaves.to_string(),
                "must be at least 2",
            ));
        }
        if t.min_data_in_leaf < 1 {
            return Err(BoostError::invalid_parameter(
                "min_data_in_leaf",
                t.min_data_in_leaf.to_string(),
                "must be at least 1",
            ));
        }
        if !(t.feature_fraction > 0.0 && t.feature_fraction <= 1.0) {
            return Err(BoostError::invalid_parameter(
                "feature_fraction",
                t.feature_fraction.to_string(),
                "must be in (0, 1]",
            ));
        }
        if t.lambda_l2 < 0.0 {
            return Err(BoostError::invalid_parameter(
                "lambda_l2",
                t.lambda_l2.to_string(),
                "must be non-negative",
            ));
        }
        if t.histogram_pool_size >= 0 && t.histogram_pool_size < 2 {
            return Err(BoostError::invalid_parameter(
                "histogram_pool_size",
                t.histogram_pool_size.to_string(),
                "needs at least 2 slots (or -1 for one per leaf)",
            ));
        }
        let b = &self.boosting;
        if b.learning_rate <= 0.0 {
            return Err(BoostError::invalid_parameter(
                "learning_rate",
                b.learning_rate.to_string(),
                "must be positive",
            ));
        }
        if !(b.bagging_fraction > 0.0 && b.bagging_fraction <= 1.0) {
            return Err(BoostError::invalid_parameter(
                "bagging_fraction",
                b.bagging_fraction.to_string(),
                "must be in (0, 1]",
            ));
        }
        if b.bagging_fraction >= 1.0 && b.bagging_freq > 0 {
            return Err(BoostError::config(
                "bagging_freq > 0 conflicts with bagging_fraction >= 1; \
                 set bagging_fraction below 1 or disable bagging_freq",
            ));
        }
        if !(0.0..=1.0).contains(&b.drop_rate) {
            return Err(BoostError::invalid_parameter(
                "drop_rate",
                b.drop_rate.to_string(),
                "must be in [0, 1]",
            ));
        }
        if self.objective.num_class < 1 {
            return Err(BoostError::invalid_parameter(
                "num_class",
                self.objective.num_class.to_string(),
                "must be at least 1",
            ));
        }
        if self.objective_type.is_multiclass() && self.objective.num_class < 2 {
            return Err(BoostError::config(
                "multiclass objectives need num_class >= 2",
            ));
        }
        if !self.objective_type.is_multiclass() && self.objective.num_class != 1 {
            return Err(BoostError::config(
                "num_class > 1 is only valid for multiclass objectives",
            ));
        }
        if self.network.num_machines < 1 {
            return Err(BoostError::invalid_parameter(
                "num_machines",
                self.network.num_machines.to_string(),
                "must be at least 1",
            ));
        }
        match self.task {
            TaskType::Train => {
                if self.io.data_filename.is_empty() {
                    return Err(BoostError::config("task=train needs data="));
                }
            }
            TaskType::Predict => {
                if self.io.input_model.is_empty() {
                    return Err(BoostError::config("task=predict needs input_model="));
                }
                if self.io.data_filename.is_empty() {
                    return Err(BoostError::config("task=predict needs data="));
                }
            }
        }
        Ok(())
    }

    /// Default metrics when none are configured: one matching the
    /// objective.
    pub fn effective_metrics(&self) -> Vec<MetricType> {
        if !self.metric_types.is_empty() {
            return self.metric_types.clone();
        }
        match self.objective_type {
            ObjectiveType::Regression => vec![MetricType::L2],
            ObjectiveType::Binary => vec![MetricType::BinaryLogloss],
            ObjectiveType::Multiclass | ObjectiveType::MulticlassOva => {
                vec![MetricType::MultiLogloss]
            }
            ObjectiveType::Lambdarank => vec![MetricType::Ndcg],
        }
    }
}

fn get_string(params: &HashMap<String, String>, name: &str, out: &mut String) -> bool {
    if let Some(v) = params.get(name) {
        *out = v.clone();
        true
    } else {
        false
    }
}

fn get_i32(params: &HashMap<String, String>, name: &str, out: &mut i32) -> Result<bool> {
    if let Some(v) = params.get(name) {
        *out = v.trim().parse::<i32>().map_err(|_| {
            BoostError::invalid_parameter(name, v.as_str(), "expected an integer")
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn get_f64(params: &HashMap<String, String>, name: &str, out: &mut f64) -> Result<bool> {
    if let Some(v) = params.get(name) {
        *out = v.trim().parse::<f64>().map_err(|_| {
            BoostError::invalid_parameter(name, v.as_str(), "expected a number")
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn get_bool(params: &HashMap<String, String>, name: &str, out: &mut bool) -> Result<bool> {
    if let Some(v) = params.get(name) {
        *out = match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => {
                return Err(BoostError::invalid_parameter(
                    name,
                    v.as_str(),
                    "expected a boolean",
                ))
            }
        };
        Ok(true)
    } else {
        Ok(false)
    }
}

fn parse_f64_list(value: &str, name: &str) -> Result<Vec<f64>> {
    value
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| BoostError::invalid_parameter(name, s, "expected numbers"))
        })
        .collect()
}
