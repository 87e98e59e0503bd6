use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("column {name} has type {actual}, expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
        actual: String,
    },

    #[error("frame operation failed: {0}")]
    Frame(String),
}

impl From<PolarsError> for TableError {
    fn from(err: PolarsError) -> Self {
        TableError::Frame(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("missing expected columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no rows left after dropping nulls ({rows_before} rows before cleaning)")]
    EmptyMatrix { rows_before: usize },

    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplitError {
    #[error("test_size must be in (0, 1), got {0}")]
    InvalidTestSize(f64),

    #[error("cannot split {groups} groups with test_size={test_size}: train={train}, test={test}")]
    TooFewGroups {
        groups: usize,
        test_size: f64,
        train: usize,
        test: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature rows have inconsistent width: expected {expected}, row {row} has {actual}")]
    RaggedFeatures {
        expected: usize,
        row: usize,
        actual: usize,
    },

    #[error("{features} feature rows but {labels} labels")]
    LabelMismatch { features: usize, labels: usize },

    #[error("model has not been fitted")]
    NotFitted,
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
