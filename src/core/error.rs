//! Error handling for the histboost crate.
//!
//! A single error enum covers the fatal conditions the engine recognises;
//! locally recoverable conditions (trivial features, empty bins, dropped
//! splits) are handled silently and never surface here.

use std::io;
use thiserror::Error;

/// Main error type for the histboost library.
#[derive(Error, Debug)]
pub enum BoostError {
    /// Configuration errors: unknown values, conflicting parameters.
    #[error("Config error: {message}")]
    Config { message: String },

    /// Data shape errors: mismatched lengths, out-of-range columns.
    #[error("Dataset error: {message}")]
    Dataset { message: String },

    /// Text parsing and file content errors during load.
    #[error("Data loading error: {message}")]
    DataLoading { message: String },

    /// Training-time errors (no valid split in the first iteration, ...).
    #[error("Training error: {message}")]
    Training { message: String },

    /// Numerical degeneracy that cannot be recovered from.
    #[error("Numerical error: {message}")]
    Numerical { message: String },

    /// Model text parse errors: unknown kind, truncated tree.
    #[error("Model format error: {message}")]
    Model { message: String },

    /// Binary dataset (de)serialisation errors.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Distributed communication errors: size mismatch, timeout.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Invalid parameter with context.
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// File I/O errors.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// CSV parsing errors from the dense text loader.
    #[error("CSV parsing error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    /// Functionality that is declared but not provided by this build.
    #[error("Not implemented: {feature}")]
    NotImplemented { feature: String },

    /// Internal invariant violations. Should not occur in normal usage.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BoostError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        BoostError::Config { message: message.into() }
    }

    pub fn dataset<S: Into<String>>(message: S) -> Self {
        BoostError::Dataset { message: message.into() }
    }

    pub fn data_loading<S: Into<String>>(message: S) -> Self {
        BoostError::DataLoading { message: message.into() }
    }

    pub fn training<S: Into<String>>(message: S) -> Self {
        BoostError::Training { message: message.into() }
    }

    pub fn numerical<S: Into<String>>(message: S) -> Self {
        BoostError::Numerical { message: message.into() }
    }

    pub fn model<S: Into<String>>(message: S) -> Self {
        BoostError::Model { message: message.into() }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        BoostError::Serialization { message: message.into() }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        BoostError::Network { message: message.into() }
    }

    pub fn not_implemented<S: Into<String>>(feature: S) -> Self {
        BoostError::NotImplemented { feature: feature.into() }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        BoostError::Internal { message: message.into() }
    }

    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        BoostError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BoostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_context() {
        let err = BoostError::dataset("weight size 10 does not match row count 12");
        assert!(err.to_string().contains("10"));
        let err = BoostError::invalid_parameter("bagging_fraction", "1.5", "must be in (0, 1]");
        assert!(err.to_string().contains("bagging_fraction"));
    }
}
