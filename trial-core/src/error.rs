//! Error types for the trial-core analysis library.
//!
//! This module provides the crate-level error handling strategy using
//! `thiserror` for automatic error trait implementations. Stage-local
//! analyzer errors live in [`crate::analyzers::errors`] and are recovered
//! by the analysis runner; only `TrialError` crosses the public API.

use thiserror::Error;

/// The main error type for the trial-core library.
///
/// Statistically degenerate inputs (unidentifiable variables, empty
/// treatment arms) are not represented here: they degrade to partial
/// results inside [`crate::result::AnalysisResult`]. This enum covers the
/// truly unrecoverable conditions.
#[derive(Error, Debug)]
pub enum TrialError {
    /// Error related to configuration or structurally invalid input.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error when a required column is not found in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TrialError>`.
pub type Result<T> = std::result::Result<T, TrialError>;

impl TrialError {
    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<serde_json::Error> for TrialError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_message() {
        let err = TrialError::configuration("dataset has no columns");
        assert_eq!(
            err.to_string(),
            "Configuration error: dataset has no columns"
        );
    }

    #[test]
    fn test_column_not_found() {
        let err = TrialError::ColumnNotFound {
            column: "outcome".to_string(),
        };
        assert_eq!(err.to_string(), "Column 'outcome' not found in dataset");
    }
}
