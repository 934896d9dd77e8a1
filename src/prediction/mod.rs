//! Scoring new rows with a trained model.

pub mod predictor;

pub use predictor::Predictor;
