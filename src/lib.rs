//! # histboost
//!
//! A histogram-based gradient boosted decision tree engine for tabular
//! data. Features are discretised into a small number of bins once at
//! load time; trees grow leaf-wise by scanning per-leaf histograms, and
//! the boosting controller handles gradients, bagging, DART dropout,
//! metrics and early stopping.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use histboost::config::Config;
//! use histboost::boosting::Boosting;
//! use histboost::core::network::Network;
//! use histboost::dataset::Dataset;
//! use histboost::metrics::Metric;
//! use histboost::objective::ObjectiveFunction;
//! use ndarray::Array2;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let features = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0])?;
//! let labels = vec![0.0f32, 1.0, 4.0, 9.0];
//! let data = Arc::new(Dataset::from_matrix(features.view(), &labels, 255, true, 1)?);
//!
//! let mut config = Config::default();
//! config.boosting.num_iterations = 10;
//! config.boosting.tree.min_data_in_leaf = 1;
//! config.boosting.tree.min_sum_hessian_in_leaf = 0.0;
//!
//! let objective = ObjectiveFunction::create(config.objective_type, &config.objective);
//! let mut boosting = Boosting::create(config.boosting.boosting_type);
//! boosting.init(&config, data, objective, Vec::new(), Arc::new(Network::single_machine()))?;
//! boosting.train()?;
//! println!("{}", boosting.predict_raw(&[2.0]));
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod boosting;
pub mod config;
pub mod core;
pub mod dataset;
pub mod io;
pub mod metrics;
pub mod objective;
pub mod prediction;
pub mod treelearner;

pub use boosting::Boosting;
pub use config::Config;
pub use core::error::{BoostError, Result};
pub use dataset::{Dataset, DatasetLoader};
pub use prediction::Predictor;
