//! Cache entry wrapper.

use appcell_types::Timestamp;
use serde::{Deserialize, Serialize};

/// Wraps a cached document with the time it was cached.
///
/// `cached_at` is the sole input to eviction ordering and to freshness
/// display. It is set when the document is fetched or saved, never when it
/// is merely read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached document.
    pub value: T,
    /// When the document was last fetched or saved.
    #[serde(rename = "cachedAt")]
    pub cached_at: Timestamp,
}

impl<T> CacheEntry<T> {
    /// Wraps a value stamped at the given time.
    pub fn new(value: T, cached_at: Timestamp) -> Self {
        Self { value, cached_at }
    }
}
