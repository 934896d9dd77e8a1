//! Multiclass softmax and one-vs-all training.

use histboost::boosting::Boosting;
use histboost::config::Config;
use histboost::core::network::Network;
use histboost::core::types::{MetricType, ObjectiveType};
use histboost::core::utils::common::softmax;
use histboost::dataset::Dataset;
use histboost::objective::ObjectiveFunction;
use ndarray::Array2;
use std::sync::Arc;

/// 30 rows, 10 per class, one informative feature plus one noise column.
fn three_class_data() -> (Array2<f64>, Vec<f32>) {
    let n = 30;
    let features = Array2::from_shape_fn((n, 2), |(r, c)| {
        let class = (r / 10) as f64;
        match c {
            0 => class * 10.0 + (r % 10) as f64 * 0.3,
            _ => ((r * 17) % 7) as f64,
        }
    });
    let labels: Vec<f32> = (0..n).map(|r| (r / 10) as f32).collect();
    (features, labels)
}

fn train_multiclass(objective_type: ObjectiveType) -> (Boosting, Array2<f64>, Vec<f32>) {
    let (features, labels) = three_class_data();
    let mut config = Config::default();
    config.io.data_filename = "unused".to_string();
    config.objective_type = objective_type;
    config.objective.num_class = 3;
    config.metric.num_class = 3;
    config.boosting.num_class = 3;
    config.metric_types = vec![MetricType::MultiLogloss];
    config.boosting.num_iterations = 10;
    config.boosting.learning_rate = 0.3;
    config.boosting.tree.num_leaves = 4;
    config.boosting.tree.min_data_in_leaf = 1;
    config.boosting.tree.min_sum_hessian_in_leaf = 0.0;

    let data = Arc::new(Dataset::from_matrix(features.view(), &labels, 64, true, 3).unwrap());
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

fn accuracy(boosting: &Boosting, features: &Array2<f64>, labels: &[f32]) -> usize {
    let mut correct = 0;
    for r in 0..features.nrows() {
        let row: Vec<f64> = (0..features.ncols()).map(|c| features[(r, c)]).collect();
        let mut scores = boosting.predict_multiclass(&row);
        softmax(&mut scores);
        let argmax = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        if argmax as i32 == labels[r] as i32 {
            correct += 1;
        }
    }
    correct
}

#[test]
fn softmax_reaches_27_of_30() {
    let (boosting, features, labels) = train_multiclass(ObjectiveType::Multiclass);
    assert_eq!(boosting.num_class(), 3);
    assert_eq!(boosting.num_models(), 30); // 10 iterations x 3 classes
    let correct = accuracy(&boosting, &features, &labels);
    assert!(correct >= 27, "only {}/30 rows classified correctly", correct);
}

#[test]
fn one_vs_all_also_separates_the_classes() {
    let (boosting, features, labels) = train_multiclass(ObjectiveType::MulticlassOva);
    let correct = accuracy(&boosting, &features, &labels);
    assert!(correct >= 27, "only {}/30 rows classified correctly", correct);
}

#[test]
fn class_major_scores_round_trip_through_model_file() {
    let (boosting, features, _) = train_multiclass(ObjectiveType::Multiclass);
    let text = boosting.save_model_to_string();
    let restored = Boosting::from_model_string(&text).unwrap();
    assert_eq!(restored.num_class(), 3);
    for r in 0..features.nrows() {
        let row: Vec<f64> = (0..features.ncols()).map(|c| features[(r, c)]).collect();
        let a = boosting.predict_multiclass(&row);
        let b = restored.predict_multiclass(&row);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }
}
