//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API key not found, set the {env} environment variable")]
    MissingApiKey { env: String },

    #[error("Unknown LLM provider '{0}' (supported: anthropic, openai)")]
    UnknownProvider(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether the HTTP clients retry this error in place
    ///
    /// Rate limits are surfaced at once with their `retry-after` hint.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::ApiError { status, .. } => matches!(*status, 408 | 500 | 502 | 503 | 504 | 529),
            LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::RateLimited { .. }
            | LlmError::InvalidResponse(_)
            | LlmError::Stream(_)
            | LlmError::MissingApiKey { .. }
            | LlmError::UnknownProvider(_)
            | LlmError::Json(_) => false,
        }
    }
}
