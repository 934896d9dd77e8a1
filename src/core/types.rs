//! Core data types shared across the histboost crate.
//!
//! The numeric aliases mirror the widths the training pipeline relies on:
//! 32-bit row indices, 32-bit gradients and labels, 64-bit histogram
//! accumulators.

use crate::core::error::{BoostError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data indexing type. 32-bit, supports up to 2 billion rows.
pub type DataSize = i32;

/// Score / gradient / hessian value type.
pub type Score = f32;

/// Target value and sample weight type.
pub type Label = f32;

/// Histogram accumulation type. 64-bit for numerical stability of the
/// per-bin gradient and hessian sums.
pub type Hist = f64;

/// Bin index type for discretized feature values.
pub type BinIndex = u32;

/// Tasks the command line front-end can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    /// Train a model from data
    Train,
    /// Score rows with an existing model
    Predict,
}

impl TaskType {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(TaskType::Train),
            "predict" | "prediction" | "test" => Ok(TaskType::Predict),
            _ => Err(BoostError::config(format!("unknown task type: {}", s))),
        }
    }
}

/// Boosting algorithm kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoostingType {
    Gbdt,
    Dart,
}

impl BoostingType {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "gbdt" | "gbrt" => Ok(BoostingType::Gbdt),
            "dart" => Ok(BoostingType::Dart),
            _ => Err(BoostError::config(format!("unknown boosting type: {}", s))),
        }
    }
}

impl fmt::Display for BoostingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoostingType::Gbdt => write!(f, "gbdt"),
            BoostingType::Dart => write!(f, "dart"),
        }
    }
}

/// Tree learning algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeLearnerType {
    /// Single machine learner
    Serial,
    /// Feature-parallel distributed learner
    Feature,
    /// Data-parallel distributed learner
    Data,
}

impl TreeLearnerType {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "serial" => Ok(TreeLearnerType::Serial),
            "feature" | "feature_parallel" => Ok(TreeLearnerType::Feature),
            "data" | "data_parallel" => Ok(TreeLearnerType::Data),
            _ => Err(BoostError::config(format!("unknown tree learner: {}", s))),
        }
    }
}

/// Objective functions supported by the boosting controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveType {
    /// L2 regression
    Regression,
    /// Binary log loss classification
    Binary,
    /// Multiclass classification with softmax
    Multiclass,
    /// Multiclass classification, one-vs-all
    MulticlassOva,
    /// Pairwise ranking with lambda gradients
    Lambdarank,
}

impl ObjectiveType {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "regression" | "regression_l2" | "mean_squared_error" | "mse" | "l2" => {
                Ok(ObjectiveType::Regression)
            }
            "binary" => Ok(ObjectiveType::Binary),
            "multiclass" | "softmax" => Ok(ObjectiveType::Multiclass),
            "multiclassova" | "multiclass_ova" | "ova" => Ok(ObjectiveType::MulticlassOva),
            "lambdarank" => Ok(ObjectiveType::Lambdarank),
            _ => Err(BoostError::config(format!("unknown objective: {}", s))),
        }
    }

    /// True when the objective trains `num_class` trees per iteration.
    pub fn is_multiclass(&self) -> bool {
        matches!(self, ObjectiveType::Multiclass | ObjectiveType::MulticlassOva)
    }
}

impl fmt::Display for ObjectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveType::Regression => write!(f, "regression"),
            ObjectiveType::Binary => write!(f, "binary"),
            ObjectiveType::Multiclass => write!(f, "multiclass"),
            ObjectiveType::MulticlassOva => write!(f, "multiclassova"),
            ObjectiveType::Lambdarank => write!(f, "lambdarank"),
        }
    }
}

/// Evaluation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    L1,
    L2,
    BinaryLogloss,
    BinaryError,
    Auc,
    MultiLogloss,
    MultiError,
    Ndcg,
}

impl MetricType {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "l1" | "mean_absolute_error" | "mae" => Ok(MetricType::L1),
            "l2" | "mean_squared_error" | "mse" => Ok(MetricType::L2),
            "binary_logloss" | "logloss" => Ok(MetricType::BinaryLogloss),
            "binary_error" => Ok(MetricType::BinaryError),
            "auc" => Ok(MetricType::Auc),
            "multi_logloss" | "multiclass" => Ok(MetricType::MultiLogloss),
            "multi_error" => Ok(MetricType::MultiError),
            "ndcg" => Ok(MetricType::Ndcg),
            _ => Err(BoostError::config(format!("unknown metric: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!(ObjectiveType::parse("mse").unwrap(), ObjectiveType::Regression);
        assert_eq!(BoostingType::parse("gbrt").unwrap(), BoostingType::Gbdt);
        assert_eq!(TreeLearnerType::parse("data").unwrap(), TreeLearnerType::Data);
        assert!(MetricType::parse("nope").is_err());
    }
}
