//! Command-line front-end: parameter loading and task dispatch.

use crate::boosting::Boosting;
use crate::config::{Config, ParameterAlias};
use crate::core::error::{BoostError, Result};
use crate::core::types::TaskType;
use crate::core::utils::common::trim_and_unquote;
use crate::core::utils::log::{Log, LogLevel};
use crate::core::utils::threading;
use crate::dataset::DatasetLoader;
use crate::metrics::Metric;
use crate::objective::ObjectiveFunction;
use crate::prediction::Predictor;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Application {
    config: Config,
}

impl Application {
    /// Parses `key=value` arguments plus an optional `config_file=` whose
    /// entries the command line overrides.
    pub fn new(args: &[String]) -> Result<Self> {
        let mut params: HashMap<String, String> = HashMap::new();
        for arg in args {
            match arg.split_once('=') {
                Some((key, value)) => {
                    let key = trim_and_unquote(key);
                    let value = trim_and_unquote(value);
                    if !key.is_empty() {
                        params.insert(key.to_string(), value.to_string());
                    }
                }
                None => Log::warning(&format!("unknown parameter on the command line: {}", arg)),
            }
        }
        ParameterAlias::key_alias_transform(&mut params);

        if let Some(config_file) = params.get("config_file").cloned() {
            match std::fs::read_to_string(&config_file) {
                Ok(content) => {
                    for line in content.lines() {
                        // strip comments
                        let line = match line.find('#') {
                            Some(pos) => &line[..pos],
                            None => line,
                        };
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match line.split_once('=') {
                            Some((key, value)) => {
                                let key = trim_and_unquote(key).to_string();
                                let value = trim_and_unquote(value).to_string();
                                // command line has higher priority
                                params.entry(key).or_insert(value);
                            }
                            None => Log::warning(&format!(
                                "unknown parameter in config file: {}",
                                line
                            )),
                        }
                    }
                }
                Err(_) => Log::warning(&format!(
                    "config file {} does not exist, ignoring it",
                    config_file
                )),
            }
            ParameterAlias::key_alias_transform(&mut params);
        }
        params.remove("config_file");

        let config = Config::from_params(&params)?;
        Ok(Application { config })
    }

    pub fn from_config(config: Config) -> Self {
        Application { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self) -> Result<()> {
        Log::reset_log_level(LogLevel::from(self.config.verbosity));
        threading::init_pool(self.config.num_threads)?;
        match self.config.task {
            TaskType::Train => self.train(),
            TaskType::Predict => self.predict(),
        }
    }

    fn train(&self) -> Result<()> {
        if self.config.network.num_machines > 1 {
            return Err(BoostError::not_implemented(
                "distributed training needs an allreduce transport; \
                 supply one through Network::with_transport in the library API",
            ));
        }
        let network = Arc::new(crate::core::network::Network::single_machine());

        // continued training: the input model's predictions seed the
        // init scores of the new run
        let input_boosting = if self.config.io.input_model.is_empty() {
            None
        } else {
            Some(Boosting::from_model_file(&self.config.io.input_model)?)
        };

        let train_data = match &input_boosting {
            Some(boosting) => {
                let predictor = Predictor::new(boosting, false, false);
                let predict_fun =
                    move |features: &[(i32, f64)]| predictor.predict_raw_one_line(features);
                let loader = DatasetLoader::new(&self.config).with_predict_fun(&predict_fun);
                Arc::new(loader.load_train()?)
            }
            None => {
                let loader = DatasetLoader::new(&self.config);
                Arc::new(loader.load_train()?)
            }
        };

        let objective =
            ObjectiveFunction::create(self.config.objective_type, &self.config.objective);
        let metric_types = self.config.effective_metrics();
        let training_metrics: Vec<Metric> = if self.config.metric.is_training_metric {
            metric_types
                .iter()
                .map(|&t| Metric::create(t, &self.config.metric))
                .collect()
        } else {
            Vec::new()
        };

        let mut boosting = Boosting::create(self.config.boosting.boosting_type);
        boosting.init(
            &self.config,
            train_data.clone(),
            objective,
            training_metrics,
            network,
        )?;

        let loader = DatasetLoader::new(&self.config);
        for valid_file in &self.config.io.valid_data_filenames {
            let valid = Arc::new(loader.load_valid(valid_file, &train_data)?);
            let metrics: Vec<Metric> = metric_types
                .iter()
                .map(|&t| Metric::create(t, &self.config.metric))
                .collect();
            boosting.add_valid_data(valid, metrics)?;
        }

        Log::info("started training");
        boosting.train()?;
        boosting.save_model_to_file(&self.config.io.output_model)?;
        Log::info("finished training");
        Ok(())
    }

    fn predict(&self) -> Result<()> {
        let boosting = Boosting::from_model_file(&self.config.io.input_model)?;
        let predictor = Predictor::new(
            &boosting,
            self.config.io.is_sigmoid,
            self.config.io.predict_leaf_index,
        );
        predictor.predict_file(
            &self.config,
            &self.config.io.data_filename,
            &self.config.io.output_result,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn command_line_parsing_applies_aliases() {
        let app = Application::new(&args(&[
            "task=train",
            "data=train.txt",
            "num_round=25",
            "sub_feature=0.5",
            "verbose=2",
        ]))
        .unwrap();
        assert_eq!(app.config().boosting.num_iterations, 25);
        assert_eq!(app.config().boosting.tree.feature_fraction, 0.5);
        assert_eq!(app.config().verbosity, 2);
    }

    #[test]
    fn config_file_has_lower_priority() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.conf");
        std::fs::write(&path, "num_iterations=5 # comment\nlearning_rate=0.3\n").unwrap();
        let app = Application::new(&args(&[
            "data=train.txt",
            &format!("config_file={}", path.display()),
            "num_iterations=50",
        ]))
        .unwrap();
        assert_eq!(app.config().boosting.num_iterations, 50);
        assert_eq!(app.config().boosting.learning_rate, 0.3);
    }

    #[test]
    fn bad_parameter_is_fatal() {
        assert!(Application::new(&args(&["data=x", "num_leaves=1"])).is_err());
    }
}
