//! Error types for outbound transport calls.
//!
//! Framework-level errors (extraction, scenes, sessions) are defined in
//! parley-framework.

use thiserror::Error;

/// Error type for calls made through a [`Bot`](crate::Bot).
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The bot is not connected to the remote service.
    #[error("bot is not connected")]
    NotConnected,
    /// The remote call timed out.
    #[error("API call timed out")]
    Timeout,
    /// The update's execution context was cancelled before the call finished.
    #[error("API call cancelled")]
    Cancelled,
    /// The remote service rejected the call.
    #[error("API error ({code}): {description}")]
    Rejected { code: i64, description: String },
    /// The update has no chat to send to.
    #[error("context has no chat to send to")]
    MissingChat,
    /// The update carries no callback query to answer.
    #[error("context has no callback query to answer")]
    MissingCallbackQuery,
    /// Failed to serialize/deserialize a request or response.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
