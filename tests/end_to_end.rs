//! CLI-level flows: train to a model file, predict to a result file.

use anyhow::Result;
use histboost::application::Application;
use std::fmt::Write as _;
use std::path::Path;

fn write_train_file(path: &Path, rows: usize) {
    let mut out = String::new();
    for r in 0..rows {
        let x0 = (r % 32) as f64;
        let x1 = ((r * 13) % 7) as f64;
        let label = if x0 > 15.0 { 1.0 } else { 0.0 };
        writeln!(out, "{}\t{}\t{}", label, x0, x1).unwrap();
    }
    std::fs::write(path, out).unwrap();
}

fn args(list: &[String]) -> Vec<String> {
    list.to_vec()
}

#[test]
fn train_then_predict_through_the_cli() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let train_path = dir.path().join("train.tsv");
    let model_path = dir.path().join("model.txt");
    let result_path = dir.path().join("preds.txt");
    write_train_file(&train_path, 600);

    let app = Application::new(&args(&[
        "task=train".to_string(),
        format!("data={}", train_path.display()),
        format!("output_model={}", model_path.display()),
        "objective=binary".to_string(),
        "metric=binary_logloss,auc".to_string(),
        "num_iterations=15".to_string(),
        "num_leaves=8".to_string(),
        "min_data_in_leaf=5".to_string(),
        "min_sum_hessian_in_leaf=0".to_string(),
        "is_training_metric=true".to_string(),
    ]))?;
    app.run()?;

    let model_text = std::fs::read_to_string(&model_path)?;
    assert!(model_text.starts_with("gbdt\n"));
    assert!(model_text.contains("Tree=14"));
    assert!(model_text.contains("feature importances:"));

    let app = Application::new(&args(&[
        "task=predict".to_string(),
        format!("data={}", train_path.display()),
        format!("input_model={}", model_path.display()),
        format!("output_result={}", result_path.display()),
    ]))?;
    app.run()?;

    let predictions = std::fs::read_to_string(&result_path)?;
    let lines: Vec<&str> = predictions.lines().collect();
    assert_eq!(lines.len(), 600);
    // sigmoid-transformed outputs are probabilities
    let mut correct = 0;
    for (r, line) in lines.iter().enumerate() {
        let p: f64 = line.trim().parse()?;
        assert!((0.0..=1.0).contains(&p));
        let predicted = p > 0.5;
        let actual = (r % 32) > 15;
        if predicted == actual {
            correct += 1;
        }
    }
    assert!(correct >= 570, "only {}/600 correct", correct);
    Ok(())
}

#[test]
fn validation_data_and_early_stopping_work_from_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.tsv");
    let valid_path = dir.path().join("valid.tsv");
    let model_path = dir.path().join("model.txt");
    write_train_file(&train_path, 600);
    write_train_file(&valid_path, 120);

    let app = Application::new(&args(&[
        "task=train".to_string(),
        format!("data={}", train_path.display()),
        format!("valid_data={}", valid_path.display()),
        format!("output_model={}", model_path.display()),
        "objective=binary".to_string(),
        "num_iterations=10".to_string(),
        "num_leaves=8".to_string(),
        "min_data_in_leaf=5".to_string(),
        "min_sum_hessian_in_leaf=0".to_string(),
        "early_stopping_round=20".to_string(),
    ]))
    .unwrap();
    app.run().unwrap();
    assert!(model_path.exists());
}

#[test]
fn leaf_index_prediction_mode() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.tsv");
    let model_path = dir.path().join("model.txt");
    let result_path = dir.path().join("leaves.txt");
    write_train_file(&train_path, 300);

    Application::new(&args(&[
        "task=train".to_string(),
        format!("data={}", train_path.display()),
        format!("output_model={}", model_path.display()),
        "objective=binary".to_string(),
        "num_iterations=3".to_string(),
        "num_leaves=4".to_string(),
        "min_data_in_leaf=5".to_string(),
        "min_sum_hessian_in_leaf=0".to_string(),
    ]))
    .unwrap()
    .run()
    .unwrap();

    Application::new(&args(&[
        "task=predict".to_string(),
        format!("data={}", train_path.display()),
        format!("input_model={}", model_path.display()),
        format!("output_result={}", result_path.display()),
        "predict_leaf_index=true".to_string(),
    ]))
    .unwrap()
    .run()
    .unwrap();

    let lines = std::fs::read_to_string(&result_path).unwrap();
    let first = lines.lines().next().unwrap();
    // one leaf id per tree
    assert_eq!(first.split('\t').count(), 3);
    for tok in first.split('\t') {
        let leaf: i32 = tok.parse().unwrap();
        assert!((0..4).contains(&leaf));
    }
}

#[test]
fn distributed_training_without_a_transport_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.tsv");
    write_train_file(&train_path, 100);
    let app = Application::new(&args(&[
        "task=train".to_string(),
        format!("data={}", train_path.display()),
        "num_machines=2".to_string(),
        "tree_learner=data".to_string(),
    ]))
    .unwrap();
    assert!(app.run().is_err());
}
