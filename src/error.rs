//! Crate-wide error type.

use thiserror::Error;

/// Errors surfaced by the analysis routines.
///
/// Unmatched lexicon joins and dropped malformed rows are *not* errors; they
/// are expected outcomes and are at most logged.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("invalid record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("at least two groups are required, got {0}")]
    TooFewGroups(usize),

    #[error("matrix is singular (rank-deficient design or degenerate groups)")]
    SingularMatrix,

    #[error("no events observed; the model cannot be fitted")]
    NoEvents,

    #[error("missing column `{0}`")]
    MissingColumn(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("invalid analysis spec: {0}")]
    InvalidSpec(String),

    #[error("invalid chapter pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalysisError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;
