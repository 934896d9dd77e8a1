//! DART: equivalence with GBDT on the first iteration and the
//! normalisation identity afterwards.

use histboost::boosting::Boosting;
use histboost::config::Config;
use histboost::core::network::Network;
use histboost::core::types::BoostingType;
use histboost::dataset::Dataset;
use histboost::objective::ObjectiveFunction;
use ndarray::Array2;
use std::sync::Arc;

fn regression_data() -> (Array2<f64>, Vec<f32>) {
    let n = 120;
    let features = Array2::from_shape_fn((n, 2), |(r, c)| ((r * (3 + c) * 7) % 31) as f64);
    let labels: Vec<f32> = (0..n).map(|r| ((r * 21) % 31) as f32 / 31.0).collect();
    (features, labels)
}

fn train(
    boosting_type: BoostingType,
    drop_rate: f64,
    num_iterations: i32,
    learning_rate: f64,
) -> (Boosting, Array2<f64>, Vec<f32>) {
    let (features, labels) = regression_data();
    let mut config = Config::default();
    config.io.data_filename = "unused".to_string();
    config.boosting.boosting_type = boosting_type;
    config.boosting.drop_rate = drop_rate;
    config.boosting.num_iterations = num_iterations;
    config.boosting.learning_rate = learning_rate;
    config.boosting.tree.num_leaves = 6;
    config.boosting.tree.min_data_in_leaf = 2;
    config.boosting.tree.min_sum_hessian_in_leaf = 0.0;

    let data = Arc::new(Dataset::from_matrix(features.view(), &labels, 64, true, 1).unwrap());
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
    boosting.train().unwrap();
    (boosting, features, labels)
}

#[test]
fn first_dart_iteration_matches_gbdt() {
    // iteration one has nothing to drop, so the shrinkage rate is 1 and
    // both algorithms produce the same tree (gbdt run with rate 1 too)
    let (gbdt, features, _) = train(BoostingType::Gbdt, 0.0, 1, 1.0);
    let (dart, _, _) = train(BoostingType::Dart, 0.0, 1, 1.0);
    assert_eq!(gbdt.num_models(), 1);
    assert_eq!(dart.num_models(), 1);
    for r in 0..features.nrows() {
        let row: Vec<f64> = (0..2).map(|c| features[(r, c)]).collect();
        assert_eq!(gbdt.predict_raw(&row), dart.predict_raw(&row));
    }
}

#[test]
fn dart_normalisation_restores_the_additive_identity() {
    // after every iteration the training score vector must equal the sum
    // of the (rescaled) trees in the model
    let (dart, features, _) = train(BoostingType::Dart, 0.5, 8, 1.0);
    assert!(dart.num_models() >= 2);
    let scores = dart.gbdt().train_scores().unwrap();
    for r in 0..features.nrows() {
        let row: Vec<f64> = (0..2).map(|c| features[(r, c)]).collect();
        let summed = dart.predict_raw(&row);
        assert!(
            (summed - scores[r] as f64).abs() < 1e-3,
            "row {}: score {} vs tree sum {}",
            r,
            scores[r],
            summed
        );
    }
}

#[test]
fn dart_model_header_names_dart() {
    let (dart, _, _) = train(BoostingType::Dart, 0.3, 3, 1.0);
    let text = dart.save_model_to_string();
    assert!(text.starts_with("dart\n"));
    let restored = Boosting::from_model_string(&text).unwrap();
    assert_eq!(restored.num_models(), dart.num_models());
}
