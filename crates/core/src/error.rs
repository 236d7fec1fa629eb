//! Error types for the grokcli domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Providers and tools
//! each have their own error type.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Unexpected response shape: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether this error is the provider's transient rate-limit signal.
    ///
    /// Only these errors are retried by the model gateway; everything else is
    /// fatal for the call.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::ApiError { status_code, .. } => *status_code == 429,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
