//! Error types for meridian-control.

use meridian_state::StateError;

/// Result type alias using [`ControlError`].
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in the control plane.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Entity missing; surfaced as 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Etag mismatch on upsert; surfaced as 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed input or missing required metadata.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A required manager was not wired at init; fatal at start.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// Semantic validation failed, e.g. a dependency cycle.
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// Provider call failed but should be retried.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Provider call failed permanently for this component.
    #[error("fatal provider error: {0}")]
    Fatal(String),

    /// Operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Stored body did not decode into the expected spec shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Upstream HTTP call failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Any unclassified failure; surfaced as 500.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Create a not-found error.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a bad-request error.
    #[must_use]
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create an invalid-spec error.
    #[must_use]
    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }

    /// Create a missing-config error.
    #[must_use]
    pub fn missing_config(msg: impl Into<String>) -> Self {
        Self::MissingConfig(msg.into())
    }

    /// Create a transient provider error.
    #[must_use]
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a fatal provider error.
    #[must_use]
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the error is a missing-entity error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True when a provider call may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<StateError> for ControlError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(id) => Self::NotFound(id),
            StateError::Conflict { id, .. } => Self::Conflict(id),
            StateError::BadRequest(msg) => Self::BadRequest(msg),
            StateError::Serialization(e) => Self::Decode(e),
            StateError::Internal(msg) => Self::Internal(msg),
        }
    }
}
