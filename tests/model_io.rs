//! Model text format round trips and parse failures.

use histboost::boosting::Boosting;
use histboost::config::Config;
use histboost::core::network::Network;
use histboost::core::types::{MetricType, ObjectiveType};
use histboost::dataset::Dataset;
use histboost::objective::ObjectiveFunction;
use ndarray::Array2;
use std::sync::Arc;

fn trained_binary_model() -> (Boosting, Array2<f64>) {
    let n = 400;
    let features = Array2::from_shape_fn((n, 3), |(r, c)| ((r * 29 + c * 11) % 53) as f64);
    let labels: Vec<f32> = (0..n)
        .map(|r| if (r * 29) % 53 > 26 { 1.0 } else { 0.0 })
        .collect();
    let mut config = Config::default();
    config.io.data_filename = "unused".to_string();
    config.objective_type = ObjectiveType::Binary;
    config.metric_types = vec![MetricType::BinaryLogloss];
    config.boosting.num_iterations = 8;
    config.boosting.tree.num_leaves = 6;
    config.boosting.tree.min_data_in_leaf = 5;
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
    (boosting, features)
}

#[test]
fn text_round_trip_preserves_predictions_and_bytes() {
    let (boosting, features) = trained_binary_model();
    let text = boosting.save_model_to_string();
    assert!(text.starts_with("gbdt\n"));
    assert!(text.contains("sigmoid=1"));
    assert!(text.contains("feature importances:"));

    let restored = Boosting::from_model_string(&text).unwrap();
    assert_eq!(restored.num_models(), boosting.num_models());
    for r in 0..features.nrows() {
        let row: Vec<f64> = (0..3).map(|c| features[(r, c)]).collect();
        assert_eq!(boosting.predict_raw(&row), restored.predict_raw(&row));
        // the sigmoid carried in the header drives the transform
        assert_eq!(boosting.predict(&row), restored.predict(&row));
    }
}

#[test]
fn model_file_round_trip() {
    let (boosting, _) = trained_binary_model();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.txt");
    boosting.save_model_to_file(path.to_str().unwrap()).unwrap();
    let restored = Boosting::from_model_file(path.to_str().unwrap()).unwrap();
    assert_eq!(restored.num_models(), boosting.num_models());
}

#[test]
fn unknown_boosting_kind_is_fatal() {
    let err = Boosting::from_model_string("xgbart\nnum_class=1\n").unwrap_err();
    assert!(err.to_string().contains("unknown boosting kind"));
}

#[test]
fn missing_header_lines_are_fatal() {
    assert!(Boosting::from_model_string("gbdt\nlabel_index=0\nmax_feature_idx=3\n").is_err());
    assert!(Boosting::from_model_string("gbdt\nnum_class=1\nmax_feature_idx=3\n").is_err());
    assert!(Boosting::from_model_string("gbdt\nnum_class=1\nlabel_index=0\n").is_err());
}

#[test]
fn truncated_tree_is_fatal() {
    let (boosting, _) = trained_binary_model();
    let text = boosting.save_model_to_string();
    // drop the second half of a leaf_value line
    let broken: String = text
        .lines()
        .map(|l| {
            if l.starts_with("leaf_value=") {
                let cut = l.rfind(' ').unwrap();
                l[..cut].to_string()
            } else {
                l.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    assert!(Boosting::from_model_string(&broken).is_err());
}

#[test]
fn leaf_index_prediction_is_stable_across_reload() {
    let (boosting, features) = trained_binary_model();
    let restored = Boosting::from_model_string(&boosting.save_model_to_string()).unwrap();
    for r in (0..features.nrows()).step_by(37) {
        let row: Vec<f64> = (0..3).map(|c| features[(r, c)]).collect();
        assert_eq!(
            boosting.predict_leaf_index(&row),
            restored.predict_leaf_index(&row)
        );
    }
}
