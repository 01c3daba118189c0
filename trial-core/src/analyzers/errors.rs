//! Error types for the analysis stage framework.

use thiserror::Error;

/// Result type for analyzer operations.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Errors that can occur inside a single analysis stage.
///
/// These never cross the public API: the analysis runner catches them,
/// logs the failure, and omits the stage's keys from the final result.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Required variable roles were not available for this stage.
    #[error("Missing variable roles: {0}")]
    MissingRoles(String),

    /// A treatment arm had no eligible rows after dropping nulls.
    #[error("Empty {arm} group for column '{column}'")]
    EmptyGroup { arm: &'static str, column: String },

    /// Too few observations for the statistic to be defined.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The computation is numerically degenerate (zero variance, singular
    /// design matrix) and has no defined answer.
    #[error("Degenerate computation: {0}")]
    Degenerate(String),

    /// A referenced column does not exist in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A referenced column is not numeric where a numeric one is required.
    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),

    /// Structured response from the text-generation capability could not
    /// be used.
    #[error("Assisted identification failed: {0}")]
    AssistedIdentification(String),

    /// Generic analyzer error with custom message.
    #[error("{0}")]
    Custom(String),
}

impl AnalyzerError {
    /// Creates an insufficient-data error with the given message.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    /// Creates a degenerate-computation error with the given message.
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::Degenerate(msg.into())
    }

    /// Creates an assisted-identification error with the given message.
    pub fn assisted(msg: impl Into<String>) -> Self {
        Self::AssistedIdentification(msg.into())
    }

    /// Creates a custom error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

impl From<serde_json::Error> for AnalyzerError {
    fn from(err: serde_json::Error) -> Self {
        Self::AssistedIdentification(format!("invalid JSON payload: {err}"))
    }
}
