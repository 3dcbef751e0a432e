//! Error types for tsbatch_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in tsbatch_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid argument supplied to a constructor or operation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Shape mismatch between tensors.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A normalizer was used before it was fitted.
    #[error("Normalizer has not been fitted")]
    NotFitted,

    /// A pre-processing hook failed.
    #[error("Pre-processing error: {0}")]
    PreProcess(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}
