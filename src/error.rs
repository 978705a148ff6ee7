//! Error types for model training and selection

use thiserror::Error;

/// Result type alias for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;

/// Coarse classification of a [`TrainerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Train/test matrices or candidates were malformed
    InvalidInput,
    /// A candidate could not be fitted or scored
    TrainingFailed,
    /// No candidate reached the minimum score
    NoViableModel,
    /// A model-level failure (shape, parameter, numerics)
    Model,
    Io,
    Serialization,
    Data,
    Config,
}

/// Main error type for the trainer
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Training failed for model '{model}': {source}")]
    TrainingFailed {
        model: String,
        #[source]
        source: Box<TrainerError>,
    },

    #[error("No viable model found: best was '{best_model}' with score {best_score:.4}, threshold {threshold}")]
    NoViableModel {
        best_model: String,
        best_score: f64,
        threshold: f64,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TrainerError {
    /// Wrap a model failure with the name of the candidate that raised it
    pub fn training_failed(model: impl Into<String>, source: TrainerError) -> Self {
        TrainerError::TrainingFailed {
            model: model.into(),
            source: Box::new(source),
        }
    }

    /// Tag of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrainerError::InvalidInput(_) => ErrorKind::InvalidInput,
            TrainerError::TrainingFailed { .. } => ErrorKind::TrainingFailed,
            TrainerError::NoViableModel { .. } => ErrorKind::NoViableModel,
            TrainerError::ShapeError { .. }
            | TrainerError::ModelNotFitted
            | TrainerError::InvalidParameter { .. }
            | TrainerError::ValidationError(_)
            | TrainerError::ComputationError(_) => ErrorKind::Model,
            TrainerError::IoError(_) => ErrorKind::Io,
            TrainerError::SerializationError(_) => ErrorKind::Serialization,
            TrainerError::DataError(_) => ErrorKind::Data,
            TrainerError::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// Innermost error in the `TrainingFailed` chain
    pub fn root_cause(&self) -> &TrainerError {
        match self {
            TrainerError::TrainingFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<polars::error::PolarsError> for TrainerError {
    fn from(err: polars::error::PolarsError) -> Self {
        TrainerError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        TrainerError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for TrainerError {
    fn from(err: bincode::Error) -> Self {
        TrainerError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TrainerError {
    fn from(err: ndarray::ShapeError) -> Self {
        TrainerError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = TrainerError::InvalidInput("train matrix is empty".to_string());
        assert_eq!(err.to_string(), "Invalid input: train matrix is empty");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TrainerError = io_err.into();
        assert!(matches!(err, TrainerError::IoError(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_training_failed_keeps_cause() {
        let cause = TrainerError::InvalidParameter {
            name: "n_neighbors".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        };
        let err = TrainerError::training_failed("K-Neighbors Regressor", cause);

        assert_eq!(err.kind(), ErrorKind::TrainingFailed);
        assert!(err.to_string().contains("K-Neighbors Regressor"));
        assert!(err.source().is_some());
        assert!(matches!(err.root_cause(), TrainerError::InvalidParameter { .. }));
    }

    #[test]
    fn test_no_viable_model_message() {
        let err = TrainerError::NoViableModel {
            best_model: "Decision Tree".to_string(),
            best_score: 0.25,
            threshold: 0.6,
        };
        assert_eq!(err.kind(), ErrorKind::NoViableModel);
        assert!(err.to_string().contains("0.2500"));
    }
}
