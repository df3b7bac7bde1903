//! Streaming error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Time order violation: bar time {bar_time} <= last emitted {last_time}")]
    OrderViolation { last_time: i64, bar_time: i64 },
}

pub type StreamResult<T> = Result<T, StreamError>;
