//! LLM error types.

use thiserror::Error;

/// Errors that can occur during language-model calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed before a response arrived.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// Provider answered with a non-success status.
    #[error("LLM provider returned HTTP {status}: {body}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Provider response did not have the expected shape.
    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    /// Request timed out.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// LLM provider is unavailable.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// All retry attempts exhausted.
    #[error("All LLM retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Description of the final failure.
        last_error: String,
    },

    /// Configuration error.
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Client errors (4xx other than 408 and 429) and configuration problems
    /// are permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::Timeout(_) | Self::Unavailable(_) => true,
            Self::Provider { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::ParseError(_) | Self::RetriesExhausted { .. } | Self::ConfigError(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(0)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else if err.is_decode() {
            LlmError::ParseError(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}
