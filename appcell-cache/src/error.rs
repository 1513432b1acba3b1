//! Error types for the cache layer.
//!
//! These never escape the public mutating API: persistence failures are
//! logged and swallowed, corrupt persisted state is treated as empty.

use thiserror::Error;

/// Result type for internal cache persistence operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur while persisting or restoring the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Durable-storage read/write failed (e.g. quota, permissions).
    #[error("cache storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Persisted cache payload failed to parse.
    #[error("cache corruption: {0}")]
    Corruption(#[from] serde_json::Error),
}
