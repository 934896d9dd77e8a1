//! Objective functions: gradients and hessians from current scores.

pub mod classification;
pub mod ranking;
pub mod regression;

use crate::config::ObjectiveConfig;
use crate::core::error::Result;
use crate::core::types::{ObjectiveType, Score};
use crate::dataset::Metadata;
use classification::{BinaryLogloss, MulticlassOva, MulticlassSoftmax};
use ranking::Lambdarank;
use regression::RegressionL2;

/// Sealed set of objectives the boosting controller can train against.
pub enum ObjectiveFunction {
    Regression(RegressionL2),
    Binary(BinaryLogloss),
    MulticlassSoftmax(MulticlassSoftmax),
    MulticlassOva(MulticlassOva),
    Lambdarank(Lambdarank),
}

impl ObjectiveFunction {
    pub fn create(objective_type: ObjectiveType, config: &ObjectiveConfig) -> Self {
        match objective_type {
            ObjectiveType::Regression => ObjectiveFunction::Regression(RegressionL2::new()),
            ObjectiveType::Binary => {
                ObjectiveFunction::Binary(BinaryLogloss::new(config.sigmoid, config.is_unbalance))
            }
            ObjectiveType::Multiclass => {
                ObjectiveFunction::MulticlassSoftmax(MulticlassSoftmax::new(config.num_class))
            }
            ObjectiveType::MulticlassOva => ObjectiveFunction::MulticlassOva(MulticlassOva::new(
                config.num_class,
                config.sigmoid,
            )),
            ObjectiveType::Lambdarank => ObjectiveFunction::Lambdarank(Lambdarank::new(
                config.sigmoid,
                config.max_position,
                config.label_gain_or_default(31),
            )),
        }
    }

    pub fn init(&mut self, metadata: &Metadata) -> Result<()> {
        match self {
            ObjectiveFunction::Regression(o) => o.init(metadata),
            ObjectiveFunction::Binary(o) => o.init(metadata),
            ObjectiveFunction::MulticlassSoftmax(o) => o.init(metadata),
            ObjectiveFunction::MulticlassOva(o) => o.init(metadata),
            ObjectiveFunction::Lambdarank(o) => o.init(metadata),
        }
    }

    /// Fills `gradients`/`hessians` (both `num_data * num_class` long,
    /// class-major) from the current scores.
    pub fn get_gradients(&self, scores: &[Score], gradients: &mut [Score], hessians: &mut [Score]) {
        match self {
            ObjectiveFunction::Regression(o) => o.get_gradients(scores, gradients, hessians),
            ObjectiveFunction::Binary(o) => o.get_gradients(scores, gradients, hessians),
            ObjectiveFunction::MulticlassSoftmax(o) => o.get_gradients(scores, gradients, hessians),
            ObjectiveFunction::MulticlassOva(o) => o.get_gradients(scores, gradients, hessians),
            ObjectiveFunction::Lambdarank(o) => o.get_gradients(scores, gradients, hessians),
        }
    }

    /// Trees trained per boosting iteration.
    pub fn num_tree_per_iteration(&self) -> i32 {
        match self {
            ObjectiveFunction::MulticlassSoftmax(o) => o.num_class(),
            ObjectiveFunction::MulticlassOva(o) => o.num_class(),
            _ => 1,
        }
    }

    /// Sigmoid parameter stored in the model header; -1 when the
    /// objective has none.
    pub fn sigmoid(&self) -> f64 {
        match self {
            ObjectiveFunction::Binary(o) => o.sigmoid(),
            _ => -1.0,
        }
    }

    /// Per-row output transform applied at prediction time.
    pub fn convert_output(&self, output: &mut [f64]) {
        match self {
            ObjectiveFunction::Binary(o) => o.convert_output(output),
            ObjectiveFunction::MulticlassSoftmax(o) => o.convert_output(output),
            ObjectiveFunction::MulticlassOva(o) => o.convert_output(output),
            _ => {}
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObjectiveFunction::Regression(_) => "regression",
            ObjectiveFunction::Binary(_) => "binary",
            ObjectiveFunction::MulticlassSoftmax(_) => "multiclass",
            ObjectiveFunction::MulticlassOva(_) => "multiclassova",
            ObjectiveFunction::Lambdarank(_) => "lambdarank",
        }
    }
}
