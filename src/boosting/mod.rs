//! Boosting controllers and model (de)serialisation.

pub mod dart;
pub mod gbdt;
pub mod score_updater;

pub use dart::Dart;
pub use gbdt::Gbdt;
pub use score_updater::ScoreUpdater;

use crate::config::Config;
use crate::core::error::{BoostError, Result};
use crate::core::network::Network;
use crate::core::types::{BoostingType, Score};
use crate::core::utils::log::Log;
use crate::dataset::Dataset;
use crate::metrics::Metric;
use crate::objective::ObjectiveFunction;
use std::io::Write;
use std::sync::Arc;

/// Sealed set of boosting algorithms.
pub enum Boosting {
    Gbdt(Gbdt),
    Dart(Dart),
}

impl std::fmt::Debug for Boosting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Boosting::Gbdt(_) => write!(f, "Boosting::Gbdt"),
            Boosting::Dart(_) => write!(f, "Boosting::Dart"),
        }
    }
}

impl Boosting {
    pub fn create(boosting_type: BoostingType) -> Self {
        match boosting_type {
            BoostingType::Gbdt => Boosting::Gbdt(Gbdt::new()),
            BoostingType::Dart => Boosting::Dart(Dart::new()),
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
        match self {
            Boosting::Gbdt(b) => b.init(config, train_data, objective, training_metrics, network),
            Boosting::Dart(b) => b.init(config, train_data, objective, training_metrics, network),
        }
    }

    pub fn add_valid_data(&mut self, valid_data: Arc<Dataset>, metrics: Vec<Metric>) -> Result<()> {
        match self {
            Boosting::Gbdt(b) => b.add_valid_data(valid_data, metrics),
            Boosting::Dart(b) => b.add_valid_data(valid_data, metrics),
        }
    }

    pub fn train(&mut self) -> Result<()> {
        match self {
            Boosting::Gbdt(b) => b.train(),
            Boosting::Dart(b) => b.train(),
        }
    }

    pub fn train_one_iter(
        &mut self,
        gradients: Option<&[Score]>,
        hessians: Option<&[Score]>,
        is_eval: bool,
    ) -> Result<bool> {
        match self {
            Boosting::Gbdt(b) => b.train_one_iter(gradients, hessians, is_eval),
            Boosting::Dart(b) => b.train_one_iter(gradients, hessians, is_eval),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Boosting::Gbdt(_) => "gbdt",
            Boosting::Dart(_) => "dart",
        }
    }

    pub fn gbdt(&self) -> &Gbdt {
        match self {
            Boosting::Gbdt(b) => b,
            Boosting::Dart(b) => b.gbdt(),
        }
    }

    fn gbdt_mut(&mut self) -> &mut Gbdt {
        match self {
            Boosting::Gbdt(b) => b,
            Boosting::Dart(b) => &mut b.gbdt,
        }
    }

    /// Model text: kind line, header, tree blocks, feature importances.
    pub fn save_model_to_string(&self) -> String {
        self.gbdt().model_to_string(self.name())
    }

    pub fn save_model_to_file(&self, filename: &str) -> Result<()> {
        let mut file = std::fs::File::create(filename)?;
        file.write_all(self.save_model_to_string().as_bytes())?;
        Log::info(&format!("model saved to {}", filename));
        Ok(())
    }

    /// Restores a booster from model text; the first line names the
    /// boosting kind.
    pub fn from_model_string(model_str: &str) -> Result<Self> {
        let kind_line = model_str
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| BoostError::model("empty model file"))?;
        let mut boosting = match kind_line.trim() {
            "gbdt" => Boosting::Gbdt(Gbdt::new()),
            "dart" => Boosting::Dart(Dart::new()),
            other => {
                return Err(BoostError::model(format!(
                    "unknown boosting kind '{}'",
                    other
                )))
            }
        };
        boosting.gbdt_mut().models_from_string(model_str)?;
        Ok(boosting)
    }

    pub fn from_model_file(filename: &str) -> Result<Self> {
        let text = std::fs::read_to_string(filename)?;
        Self::from_model_string(&text)
    }

    pub fn num_class(&self) -> i32 {
        self.gbdt().num_class()
    }

    pub fn num_models(&self) -> usize {
        self.gbdt().models().len()
    }

    pub fn current_iteration(&self) -> i32 {
        self.gbdt().current_iteration()
    }

    pub fn predict_raw(&self, features: &[f64]) -> f64 {
        self.gbdt().predict_raw(features)
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        self.gbdt().predict(features)
    }

    pub fn predict_multiclass(&self, features: &[f64]) -> Vec<f64> {
        self.gbdt().predict_multiclass(features)
    }

    pub fn predict_leaf_index(&self, features: &[f64]) -> Vec<i32> {
        self.gbdt().predict_leaf_index(features)
    }

    pub fn eval_current(&self, include_training: bool) -> Vec<String> {
        self.gbdt().eval_current(include_training)
    }
}
