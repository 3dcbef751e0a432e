//! Error types for tsbatch_data.

use thiserror::Error;

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur in data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] tsbatch_core::CoreError),
}

/// Failure raised while evaluating a trading rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Rule evaluation failed at index {index}: {message}")]
pub struct RuleError {
    /// Bar index being evaluated.
    pub index: usize,
    /// What went wrong.
    pub message: String,
}

impl RuleError {
    /// Create a rule error.
    #[must_use]
    pub fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }
}
