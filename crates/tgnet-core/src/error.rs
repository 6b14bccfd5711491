//! Error types for the temporal graph network core.

use thiserror::Error;

/// Unified error type for model construction and inference.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error detected at construction or call entry.
    #[error("configuration error: {0}")]
    Config(String),

    /// Dimension mismatch between batched inputs.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Index past the end of a bounded table.
    #[error("index {index} out of bounds for {what} of size {size}")]
    IndexOutOfBounds {
        /// What was being indexed.
        what: &'static str,
        /// The offending index.
        index: usize,
        /// Size of the indexed table.
        size: usize,
    },

    /// Numerical error (NaN, Inf, or other instability).
    #[error("numerical error: {0}")]
    NumericalError(String),
}

/// Convenience result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
