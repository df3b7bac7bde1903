//! History error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    /// Error payload from the exchange. Displays the exchange message as is.
    #[error("{msg}")]
    Upstream { code: i64, msg: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Response parse error: {0}")]
    ParseError(String),
}

impl HistoryError {
    /// Metric label for a failed request.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Upstream { .. } | Self::Status { .. } => "upstream_error",
            Self::HttpClient(_) | Self::Transport(_) | Self::ParseError(_) => "transport_error",
        }
    }
}

pub type HistoryResult<T> = Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_displays_message_only() {
        let err = HistoryError::Upstream {
            code: -1121,
            msg: "Invalid symbol.".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid symbol.");
        assert_eq!(err.outcome_label(), "upstream_error");
    }
}
