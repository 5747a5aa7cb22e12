use thiserror::Error;

/// Failure of a telemetry or backend request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request could not be sent or completed (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// A required input was missing. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Well-formed response that lacks the expected payload.
    #[error("no data: {0}")]
    NoData(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_validation(&self) -> bool {
        matches!(self, FetchError::Validation(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Failure reported by the host platform's window API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("window not declared: {0}")]
    UnknownWindow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_carries_code_and_message() {
        let err = FetchError::HttpStatus {
            status: 404,
            message: "Summoner not found".into(),
        };
        assert_eq!(err.to_string(), "HTTP 404: Summoner not found");
    }

    #[test]
    fn test_only_validation_is_flagged() {
        assert!(FetchError::Validation("Name and tag are required".into()).is_validation());
        assert!(!FetchError::Network("refused".into()).is_validation());
        assert!(!FetchError::NoData("empty".into()).is_validation());
    }
}
