//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("History error: {0}")]
    History(#[from] chartfeed_history::HistoryError),

    #[error(transparent)]
    Resolve(#[from] crate::catalog::ResolveError),
}

pub type AppResult<T> = Result<T, AppError>;
