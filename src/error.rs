//! Error types for the cardiorisk pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, CardioError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum CardioError {
    /// Neither the local dataset nor the network fallback produced data
    #[error("Dataset unavailable: local source failed ({local}); remote source failed ({remote})")]
    DataUnavailable { local: String, remote: String },

    /// A prediction record lacks features the artifact was trained on
    #[error("Schema mismatch: record is missing required features {missing:?}")]
    SchemaMismatch { missing: Vec<String> },

    /// A persisted artifact could not be read back
    #[error("Artifact at {path} is corrupt: {reason}")]
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// The trainer could not write the artifact
    #[error("Failed to persist artifact to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for CardioError {
    fn from(err: polars::error::PolarsError) -> Self {
        CardioError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for CardioError {
    fn from(err: serde_json::Error) -> Self {
        CardioError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CardioError {
    fn from(err: ndarray::ShapeError) -> Self {
        CardioError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for CardioError {
    fn from(err: reqwest::Error) -> Self {
        CardioError::DataError(format!("HTTP request failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CardioError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CardioError = io_err.into();
        assert!(matches!(err, CardioError::IoError(_)));
    }

    #[test]
    fn test_schema_mismatch_lists_features() {
        let err = CardioError::SchemaMismatch {
            missing: vec!["thalach".to_string(), "oldpeak".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("thalach"));
        assert!(msg.contains("oldpeak"));
    }
}
