//! Error types for the data lab

use thiserror::Error;

/// Result type alias for data lab operations
pub type Result<T> = std::result::Result<T, DatalabError>;

/// Main error type for the data lab
#[derive(Error, Debug)]
pub enum DatalabError {
    /// Unknown session or a missing prerequisite artifact
    #[error("{0}")]
    NotFound(String),

    /// Unparsable upload, wrong file type, bad request payload
    #[error("{0}")]
    InvalidInput(String),

    /// Model fitting failed (degenerate target, non-numeric feature, ...)
    #[error("{0}")]
    TrainingFailed(String),

    /// Unexpected computation failure
    #[error("{0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl DatalabError {
    /// Stable snake_case name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            DatalabError::NotFound(_) => "not_found",
            DatalabError::InvalidInput(_) | DatalabError::Data(_) => "invalid_input",
            DatalabError::TrainingFailed(_)
            | DatalabError::ShapeError { .. }
            | DatalabError::ModelNotFitted => "training_failed",
            DatalabError::Internal(_)
            | DatalabError::Io(_)
            | DatalabError::Serialization(_) => "internal",
        }
    }

    /// Re-tag any error raised while fitting as a training failure
    pub fn into_training_failure(self) -> Self {
        match self {
            DatalabError::TrainingFailed(_) => self,
            other => DatalabError::TrainingFailed(other.to_string()),
        }
    }
}

impl From<polars::error::PolarsError> for DatalabError {
    fn from(err: polars::error::PolarsError) -> Self {
        DatalabError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for DatalabError {
    fn from(err: serde_json::Error) -> Self {
        DatalabError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for DatalabError {
    fn from(err: bincode::Error) -> Self {
        DatalabError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DatalabError {
    fn from(err: ndarray::ShapeError) -> Self {
        DatalabError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
