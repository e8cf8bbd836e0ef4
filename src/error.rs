//! Error types for boostrun

use thiserror::Error;

/// Result type alias for boostrun operations
pub type Result<T> = std::result::Result<T, BoostError>;

/// Main error type for boostrun
#[derive(Error, Debug)]
pub enum BoostError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// An operation was called on an object in the wrong state.
    #[error("Usage error: {0}")]
    UsageError(String),

    #[error("Unknown parameter: '{0}' is not part of the set of parameters")]
    UnknownParameter(String),

    #[error("Type mismatch for parameter '{name}': expected {expected}, got {actual}")]
    ParameterType {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl BoostError {
    /// Whether the error comes from misusing the API rather than from bad data.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            BoostError::UsageError(_)
                | BoostError::UnknownParameter(_)
                | BoostError::ParameterType { .. }
                | BoostError::ModelNotFitted
        )
    }
}

impl From<polars::error::PolarsError> for BoostError {
    fn from(err: polars::error::PolarsError) -> Self {
        BoostError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for BoostError {
    fn from(err: serde_json::Error) -> Self {
        BoostError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for BoostError {
    fn from(err: bincode::Error) -> Self {
        BoostError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for BoostError {
    fn from(err: ndarray::ShapeError) -> Self {
        BoostError::ShapeError {
            expected: "matching dimensions".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BoostError::ValidationError("test error".to_string());
        assert_eq!(err.to_string(), "Validation error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BoostError = io_err.into();
        assert!(matches!(err, BoostError::IoError(_)));
    }

    #[test]
    fn test_usage_classification() {
        assert!(BoostError::UnknownParameter("foo".into()).is_usage());
        assert!(BoostError::ModelNotFitted.is_usage());
        assert!(!BoostError::DataError("bad".into()).is_usage());
    }
}
