//! Regression training end to end, including the tiny exact-fit case.

use approx::assert_abs_diff_eq;
use histboost::boosting::Boosting;
use histboost::config::Config;
use histboost::core::network::Network;
use histboost::dataset::Dataset;
use histboost::objective::ObjectiveFunction;
use ndarray::Array2;
use std::sync::Arc;

fn base_config() -> Config {
    let mut config = Config::default();
    config.io.data_filename = "unused".to_string();
    config.boosting.tree.min_data_in_leaf = 1;
    config.boosting.tree.min_sum_hessian_in_leaf = 0.0;
    config
}

fn train(config: &Config, data: Arc<Dataset>) -> Boosting {
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
fn tiny_regression_fits_exactly() {
    // four rows, one feature, enough leaves for one leaf per row
    let features = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
    let labels = vec![0.0f32, 1.0, 4.0, 9.0];
    let data = Arc::new(Dataset::from_matrix(features.view(), &labels, 255, true, 1).unwrap());

    let mut config = base_config();
    config.boosting.num_iterations = 1;
    config.boosting.learning_rate = 1.0;
    config.boosting.tree.num_leaves = 4;
    let boosting = train(&config, data);

    assert_eq!(boosting.num_models(), 1);
    for (i, &x) in [0.0, 1.0, 2.0, 3.0].iter().enumerate() {
        assert_abs_diff_eq!(boosting.predict_raw(&[x]), labels[i] as f64, epsilon = 1e-9);
    }
}

#[test]
fn training_scores_match_summed_tree_predictions() {
    let n = 300;
    let features = Array2::from_shape_fn((n, 3), |(r, c)| ((r * (c + 2) * 13) % 97) as f64);
    let labels: Vec<f32> = (0..n).map(|r| ((r * 13) % 97) as f32 / 10.0).collect();
    let data = Arc::new(Dataset::from_matrix(features.view(), &labels, 64, true, 1).unwrap());

    let mut config = base_config();
    config.boosting.num_iterations = 20;
    config.boosting.learning_rate = 0.2;
    config.boosting.tree.num_leaves = 8;
    let boosting = train(&config, data);

    let train_scores = boosting.gbdt().train_scores().unwrap();
    for r in 0..n {
        let row: Vec<f64> = (0..3).map(|c| features[(r, c)]).collect();
        let predicted = boosting.predict_raw(&row);
        assert!(
            (predicted - train_scores[r] as f64).abs() < 1e-4,
            "row {}: score {} vs prediction {}",
            r,
            train_scores[r],
            predicted
        );
    }
}

#[test]
fn shrinkage_scales_predictions() {
    let features = Array2::from_shape_vec((8, 1), (0..8).map(|i| i as f64).collect()).unwrap();
    let labels: Vec<f32> = (0..8).map(|i| i as f32).collect();
    let data = Arc::new(Dataset::from_matrix(features.view(), &labels, 255, true, 1).unwrap());

    let mut full = base_config();
    full.boosting.num_iterations = 1;
    full.boosting.learning_rate = 1.0;
    full.boosting.tree.num_leaves = 8;
    let full_model = train(&full, data.clone());

    let mut half = full.clone();
    half.boosting.learning_rate = 0.5;
    let half_model = train(&half, data);

    for x in 0..8 {
        let f = full_model.predict_raw(&[x as f64]);
        let h = half_model.predict_raw(&[x as f64]);
        assert_abs_diff_eq!(h, 0.5 * f, epsilon = 1e-9);
    }
}

#[test]
fn flat_labels_cannot_start_training() {
    let features = Array2::from_shape_vec((16, 1), (0..16).map(|i| i as f64).collect()).unwrap();
    let labels = vec![2.5f32; 16];
    let data = Arc::new(Dataset::from_matrix(features.view(), &labels, 255, true, 1).unwrap());

    let mut config = base_config();
    config.boosting.num_iterations = 3;
    let objective = ObjectiveFunction::create(config.objective_type, &config.objective);
    let mut boosting = Boosting::create(config.boosting.boosting_type);
    boosting
        .init(
            &config,
            data,
            objective,
            Vec::new(),
            Arc::new(Network::single_machine()),
        )
        .unwrap();
    // constant gradients: no split can improve the loss
    assert!(boosting.train().is_err());
}
