//! Error types for the Parley framework.
//!
//! Handlers and middleware return [`HandlerResult`], whose error side is a
//! [`BoxError`]. The typed errors below convert into it with `?` and can be
//! recovered again with `err.downcast_ref::<SceneError>()` and friends.

use std::any::Any;

use thiserror::Error;

pub use tower::BoxError;

/// Result type returned by handlers, middleware and the router.
pub type HandlerResult = Result<(), BoxError>;

/// Errors that can occur during context extraction.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The update carries no message.
    #[error("update has no message")]
    MissingMessage,

    /// The update carries no callback query.
    #[error("update has no callback query")]
    MissingCallbackQuery,

    /// No user could be resolved from the update.
    #[error("update has no user")]
    MissingUser,

    /// No chat could be resolved from the update.
    #[error("update has no chat")]
    MissingChat,

    /// Nothing of the requested type was put into the context state.
    #[error("no value of type '{0}' in context state")]
    MissingState(&'static str),

    /// A handle outlived the dispatch it was bound to.
    #[error("context is no longer alive")]
    ContextGone,

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// A panic caught by the [`recover`](crate::middleware::recover) middleware.
#[derive(Debug, Error)]
#[error("handler panicked: {message}")]
pub struct PanicError {
    /// The panic payload, when it was a string.
    pub message: String,
    /// Source location of the panic, as `file:line:column`.
    pub location: Option<String>,
    /// Stack captured while the panicking frames were still live.
    pub backtrace: String,
}

impl PanicError {
    pub(crate) fn new(
        payload: Box<dyn Any + Send>,
        location: Option<String>,
        backtrace: String,
    ) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self {
            message,
            location,
            backtrace,
        }
    }
}

/// Errors returned by scene transitions.
#[derive(Debug, Error)]
pub enum SceneError {
    /// No scene with this name is registered.
    #[error("scene '{0}' not found")]
    NotFound(String),

    /// The current scene's leave hook failed; the transition was aborted.
    #[error("failed to leave scene '{scene}': {source}")]
    Leave {
        /// The scene that refused to be left.
        scene: String,
        /// The hook's error.
        #[source]
        source: BoxError,
    },

    /// The target scene's enter hook failed after it was recorded as current.
    #[error("failed to enter scene '{scene}': {source}")]
    Enter {
        /// The scene that failed to enter.
        scene: String,
        /// The hook's error.
        #[source]
        source: BoxError,
    },

    /// The scene control could not reach its context.
    #[error(transparent)]
    Context(#[from] ExtractError),
}

/// Errors raised by a [`SessionStore`](crate::session::SessionStore) backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    /// The backend reported an error.
    #[error("session store backend error: {0}")]
    Backend(String),
}

/// Result type for session store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the session middleware.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No store key could be derived from the update.
    #[error("failed to build session key: {0}")]
    Key(String),

    /// The store failed while loading, saving or deleting.
    #[error("session store error for key '{key}': {source}")]
    Store {
        /// The session key.
        key: String,
        /// The backend error.
        #[source]
        source: StoreError,
    },

    /// Stored bytes could not be decoded into the session type.
    #[error("failed to decode session with key '{key}': {source}")]
    Decode {
        /// The session key.
        key: String,
        /// The decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The session value could not be encoded.
    #[error("failed to encode session with key '{key}': {source}")]
    Encode {
        /// The session key.
        key: String,
        /// The encoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The update was cancelled while a store call was in flight.
    #[error("session operation cancelled")]
    Cancelled,
}

impl SessionError {
    /// Creates a key derivation error.
    pub fn key(msg: impl Into<String>) -> Self {
        Self::Key(msg.into())
    }
}
