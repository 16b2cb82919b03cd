//! Error types for meridian-state.

/// Result type alias using [`StateError`].
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur in a state store backend.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Entry does not exist.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Supplied etag disagrees with the stored entry.
    #[error("etag conflict on {id}: supplied {supplied}, stored {stored}")]
    Conflict {
        /// Entry identifier.
        id: String,
        /// Etag supplied by the caller.
        supplied: String,
        /// Etag currently stored.
        stored: String,
    },

    /// Request is malformed (empty id, missing resource metadata).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Body could not be serialised or deserialised.
    #[error("serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StateError {
    /// Create a bad-request error.
    #[must_use]
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the error is a missing-entry error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
