//! Error types for chartfeed-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Unknown resolution: {0}")]
    UnknownResolution(String),
}

/// Result type alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
