//! Bounded local document cache for Appcell.
//!
//! The cache sits between the UI and the remote store and is purely a
//! performance optimization: correctness is owned by the remote store, so
//! every failure mode here degrades to "empty" or "not cached," never to an
//! error the caller has to handle.
//!
//! Two sub-caches:
//! - a bounded table of app bundles, evicted least-recently-*cached* first
//!   (recency is stamped on write, not on read)
//! - an unbounded key/value table for folder-id lookups, file-id lookups,
//!   session lists, and individual session documents
//!
//! All mutations are persisted synchronously to a JSON file; a persistence
//! failure is logged and swallowed.

mod entry;
mod error;
mod store;

pub use entry::CacheEntry;
pub use error::{CacheError, CacheResult};
pub use store::{LocalCache, DEFAULT_APP_CAPACITY};
