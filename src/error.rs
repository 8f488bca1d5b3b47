//! Domain-specific error types for netflow-classify.
//!
//! Uses `thiserror` for the library-level taxonomy; the CLI wraps these in
//! `anyhow` with file context.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading, validating or writing flow datasets.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset '{0}' contains no flow records")]
    Empty(String),

    #[error("Required column '{0}' is missing")]
    MissingColumn(String),

    #[error("Row {row}: invalid value '{value}' in column '{column}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
}

/// Errors that make a train/test split impossible or meaningless.
#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("Number of test subsets must be at least 1")]
    NoTestSubsets,

    #[error("Train fraction must be strictly between 0 and 1, got {0}")]
    InvalidTrainFraction(f64),

    #[error("Class '{class}' has {count} record(s); at least 2 are needed to split it")]
    ClassTooSmall { class: String, count: usize },

    #[error("Cannot build {requested} test subsets from a test pool of {available} rows")]
    TooManyTests { requested: usize, available: usize },

    #[error("Row {0} has no class label; run the label stage first")]
    MissingLabel(usize),

    #[error("Feature list is empty")]
    NoFeatures,

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Errors from fitting, applying or loading a [`crate::scaling::ScalingTransform`].
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Cannot fit a scaling transform on zero rows")]
    EmptyFit,

    #[error("Feature schema mismatch: transform was fit on {expected:?}, data has {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Row has {actual} values but the transform expects {expected}")]
    Width { expected: usize, actual: usize },

    #[error("Transform fingerprint mismatch (stored {stored}, computed {computed}); artifact is corrupt")]
    Fingerprint { stored: String, computed: String },

    #[error("Transform artifact is inconsistent: {names} names, {means} means, {scales} scales")]
    Inconsistent {
        names: usize,
        means: usize,
        scales: usize,
    },

    #[error("Failed to (de)serialize transform: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Transform I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while aggregating classifier results.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Missing classification report '{0}'")]
    MissingReport(PathBuf),

    #[error("Malformed classification report '{path}': {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Confidence interval needs at least {required} test subsets, got {actual}")]
    InsufficientTests { required: usize, actual: usize },

    #[error("Invalid interval distribution: {0}")]
    Distribution(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
