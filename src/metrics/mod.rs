//! Evaluation metrics over score vectors.

pub mod classification;
pub mod ranking;
pub mod regression;

use crate::config::MetricConfig;
use crate::core::error::Result;
use crate::core::types::{MetricType, Score};
use crate::dataset::Metadata;
use classification::{
    AucMetric, BinaryErrorMetric, BinaryLoglossMetric, MultiErrorMetric, MultiLoglossMetric,
};
use ranking::NdcgMetric;
use regression::{L1Metric, L2Metric};

/// Sealed set of metrics the boosting controller can evaluate.
pub enum Metric {
    L1(L1Metric),
    L2(L2Metric),
    BinaryLogloss(BinaryLoglossMetric),
    BinaryError(BinaryErrorMetric),
    Auc(AucMetric),
    MultiLogloss(MultiLoglossMetric),
    MultiError(MultiErrorMetric),
    Ndcg(NdcgMetric),
}

impl Metric {
    pub fn create(metric_type: MetricType, config: &MetricConfig) -> Self {
        match metric_type {
            MetricType::L1 => Metric::L1(L1Metric::new()),
            MetricType::L2 => Metric::L2(L2Metric::new()),
            MetricType::BinaryLogloss => {
                Metric::BinaryLogloss(BinaryLoglossMetric::new(config.sigmoid))
            }
            MetricType::BinaryError => Metric::BinaryError(BinaryErrorMetric::new()),
            MetricType::Auc => Metric::Auc(AucMetric::new()),
            MetricType::MultiLogloss => {
                Metric::MultiLogloss(MultiLoglossMetric::new(config.num_class))
            }
            MetricType::MultiError => Metric::MultiError(MultiErrorMetric::new(config.num_class)),
            MetricType::Ndcg => Metric::Ndcg(NdcgMetric::new(
                &config.eval_at,
                if config.label_gain.is_empty() {
                    (0..32).map(|i| (2f64).powi(i) - 1.0).collect()
                } else {
                    config.label_gain.clone()
                },
            )),
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        match self {
            Metric::L1(m) => m.init(metadata),
            Metric::L2(m) => m.init(metadata),
            Metric::BinaryLogloss(m) => m.init(metadata),
            Metric::BinaryError(m) => m.init(metadata),
            Metric::Auc(m) => m.init(metadata),
            Metric::MultiLogloss(m) => m.init(metadata),
            Metric::MultiError(m) => m.init(metadata),
            Metric::Ndcg(m) => m.init(metadata),
        }
    }

    /// Evaluates the metric; most return one value, NDCG one per
    /// configured position.
    pub fn eval(&self, scores: &[Score]) -> Vec<f64> {
        match self {
            Metric::L1(m) => m.eval(scores),
            Metric::L2(m) => m.eval(scores),
            Metric::BinaryLogloss(m) => m.eval(scores),
            Metric::BinaryError(m) => m.eval(scores),
            Metric::Auc(m) => m.eval(scores),
            Metric::MultiLogloss(m) => m.eval(scores),
            Metric::MultiError(m) => m.eval(scores),
            Metric::Ndcg(m) => m.eval(scores),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::L1(_) => "l1",
            Metric::L2(_) => "l2",
            Metric::BinaryLogloss(_) => "binary_logloss",
            Metric::BinaryError(_) => "binary_error",
            Metric::Auc(_) => "auc",
            Metric::MultiLogloss(_) => "multi_logloss",
            Metric::MultiError(_) => "multi_error",
            Metric::Ndcg(_) => "ndcg",
        }
    }

    pub fn is_bigger_better(&self) -> bool {
        matches!(self, Metric::Auc(_) | Metric::Ndcg(_))
    }
}
