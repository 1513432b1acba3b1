//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Cache-layer failures never appear here: the cache absorbs its own errors
/// and must never be the reason a correct remote operation appears to fail.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No valid credential; raised before any network attempt.
    #[error("authentication missing: no valid credential available")]
    AuthenticationMissing,

    /// Non-success response from the remote store, including rate limiting.
    /// Carries the store's own error body. Never retried here.
    #[error("remote store error ({status}): {message}")]
    RemoteStore { status: u16, message: String },

    /// Transport-level failure before a response was received.
    #[error("network error: {0}")]
    Network(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote document content did not have the expected shape.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// An expected document was absent from the remote store.
    #[error("not found: {0}")]
    NotFound(String),
}
