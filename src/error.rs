//! Error types for the risk scoring pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a request payload into a feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("could not convert {field} to float: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },
}

/// Classifier fitting and evaluation errors.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model has not been fitted")]
    NotFitted,

    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("feature rows ({rows}) and labels ({labels}) differ in length")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("label at row {row} is {label}, expected 0 or 1")]
    InvalidLabel { row: usize, label: u8 },

    #[error("training labels contain a single class")]
    SingleClass,

    #[error("invalid hyperparameter: {0}")]
    InvalidParams(String),
}

/// Persisted artifact errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode artifact {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to encode artifact: {0}")]
    Encode(#[from] bincode::Error),

    #[error("unsupported artifact format version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("invalid artifact: {0}")]
    Invalid(String),
}

/// Fatal training-time errors.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("feature '{feature}' has zero variance in the training partition")]
    DegenerateFeature { feature: &'static str },

    #[error("stratified split is infeasible: {0}")]
    InfeasibleSplit(String),

    #[error("dataset format error: {0}")]
    DatasetFormat(String),

    #[error("io error on dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid sampling distribution: {0}")]
    Distribution(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Per-request prediction failure.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Model not loaded")]
    ModelUnavailable,

    #[error("{0}")]
    InvalidInput(String),
}

impl From<CodecError> for PredictError {
    fn from(err: CodecError) -> Self {
        PredictError::InvalidInput(err.to_string())
    }
}

impl From<serde_json::Error> for PredictError {
    fn from(err: serde_json::Error) -> Self {
        PredictError::InvalidInput(format!("invalid JSON body: {}", err))
    }
}
