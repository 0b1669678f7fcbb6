use thiserror::Error;

/// Custom error type for Fathom operations.
#[derive(Debug, Error)]
pub enum FathomError {
    /// The upstream search service rejected or failed the request.
    #[error("Upstream error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Upstream {
        /// HTTP status, when the failure came from an HTTP response.
        status: Option<u16>,
        message: String,
        /// Raw `Retry-After` header value, if the upstream sent one.
        retry_after: Option<String>,
    },

    /// An operation did not settle within its deadline.
    ///
    /// The underlying operation is *not* cancelled — only the wait is
    /// abandoned. Callers must not assume resources were cleaned up.
    #[error("Operation '{label}' timed out after {deadline_ms}ms")]
    Timeout { label: String, deadline_ms: u64 },

    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A pagination cursor could not be decoded or is out of range.
    #[error("Invalid cursor: {0}")]
    Cursor(String),

    /// The elicitation round trip itself failed (transport, schema, or
    /// response validation).
    #[error("Elicitation error: {0}")]
    Elicitation(String),

    /// The user declined or cancelled an elicitation request. Terminal;
    /// never retried automatically.
    #[error("Declined by user: {0}")]
    Declined(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for FathomError {
    fn from(err: reqwest::Error) -> Self {
        FathomError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            retry_after: None,
        }
    }
}

impl From<serde_json::Error> for FathomError {
    fn from(err: serde_json::Error) -> Self {
        FathomError::Validation(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for FathomError {
    fn from(err: std::io::Error) -> Self {
        FathomError::Config(format!("I/O error: {}", err))
    }
}
