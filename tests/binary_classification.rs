//! Binary classification: reproducibility and early stopping.

use histboost::boosting::Boosting;
use histboost::config::Config;
use histboost::core::network::Network;
use histboost::core::types::{MetricType, ObjectiveType};
use histboost::dataset::Dataset;
use histboost::metrics::Metric;
use histboost::objective::ObjectiveFunction;
use ndarray::Array2;
use std::sync::Arc;

fn binary_config() -> Config {
    let mut config = Config::default();
    config.io.data_filename = "unused".to_string();
    config.objective_type = ObjectiveType::Binary;
    config.metric_types = vec![MetricType::BinaryLogloss];
    config.boosting.tree.min_data_in_leaf = 5;
    config.boosting.tree.min_sum_hessian_in_leaf = 0.0;
    config.boosting.tree.num_leaves = 8;
    config
}

/// 1000 rows, noisy but learnable decision boundary.
fn binary_data() -> (Array2<f64>, Vec<f32>) {
    let n = 1000;
    let features = Array2::from_shape_fn((n, 4), |(r, c)| {
        (((r * 73 + c * 31) % 211) as f64) / 211.0
    });
    let labels: Vec<f32> = (0..n)
        .map(|r| {
            let x0 = ((r * 73) % 211) as f64 / 211.0;
            let x1 = ((r * 73 + 31) % 211) as f64 / 211.0;
            let noise = ((r * 37) % 17) as f64 / 17.0 * 0.2;
            if x0 + 0.5 * x1 + noise > 0.85 {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    (features, labels)
}

fn train_binary(config: &Config, features: &Array2<f64>, labels: &[f32]) -> Boosting {
    let data = Arc::new(Dataset::from_matrix(features.view(), labels, 255, true, 1).unwrap());
    let objective = ObjectiveFunction::create(config.objective_type, &config.objective);
    let mut boosting = Boosting::create(config.boosting.boosting_type);
    boosting
        .init(
            config,
            data,
            objective,
            Vec::new(),
            Arc::new(Network::single_machine()),
        )
        .unwrap();
    boosting.train().unwrap();
    boosting
}

#[test]
fn retraining_is_byte_identical() {
    let (features, labels) = binary_data();
    let mut config = binary_config();
    config.boosting.num_iterations = 100;
    config.boosting.learning_rate = 0.1;

    let first = train_binary(&config, &features, &labels).save_model_to_string();
    let second = train_binary(&config, &features, &labels).save_model_to_string();
    assert_eq!(first, second);
    assert!(first.starts_with("gbdt\n"));
}

#[test]
fn logloss_decreases_during_training() {
    let (features, labels) = binary_data();
    let config = binary_config();
    let data = Arc::new(Dataset::from_matrix(features.view(), &labels, 255, true, 1).unwrap());

    let mut metric = Metric::create(MetricType::BinaryLogloss, &config.metric);
    metric.init(data.metadata()).unwrap();
    let initial = metric.eval(&vec![0.0; labels.len()])[0];

    let mut trained_config = config.clone();
    trained_config.boosting.num_iterations = 30;
    let boosting = train_binary(&trained_config, &features, &labels);
    let final_loss = metric.eval(boosting.gbdt().train_scores().unwrap())[0];
    assert!(
        final_loss < initial * 0.8,
        "logloss did not improve: {} -> {}",
        initial,
        final_loss
    );
}

#[test]
fn early_stopping_truncates_the_model() {
    // training labels and validation labels are exact opposites, so the
    // validation metric is best after the first iteration and only gets
    // worse; patience is exhausted five iterations later
    let n = 200;
    let features = Array2::from_shape_fn((n, 1), |(r, _)| r as f64);
    let train_labels: Vec<f32> = (0..n).map(|r| (r % 2) as f32).collect();
    let valid_labels: Vec<f32> = (0..n).map(|r| 1.0 - (r % 2) as f32).collect();

    let mut config = binary_config();
    config.boosting.num_iterations = 100;
    config.boosting.learning_rate = 0.5;
    config.boosting.tree.num_leaves = 31;
    config.boosting.tree.min_data_in_leaf = 1;
    config.boosting.early_stopping_round = 5;

    let train_data =
        Arc::new(Dataset::from_matrix(features.view(), &train_labels, 255, true, 1).unwrap());
    let valid_data = Arc::new(
        Dataset::from_matrix_aligned(&train_data, features.view(), &valid_labels, true).unwrap(),
    );

    let objective = ObjectiveFunction::create(config.objective_type, &config.objective);
    let mut boosting = Boosting::create(config.boosting.boosting_type);
    boosting
        .init(
            &config,
            train_data,
            objective,
            Vec::new(),
            Arc::new(Network::single_machine()),
        )
        .unwrap();
    boosting
        .add_valid_data(valid_data, vec![Metric::create(MetricType::BinaryLogloss, &config.metric)])
        .unwrap();
    boosting.train().unwrap();

    let iterations = boosting.current_iteration();
    assert!(iterations < 100, "early stopping never fired");
    assert_eq!(
        boosting.num_models() as i32,
        iterations - config.boosting.early_stopping_round,
        "the trailing patience window must be dropped from the model"
    );
}
