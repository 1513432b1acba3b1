//! Core type definitions for Appcell.
//!
//! Shared by the cache, sync, and guest-host crates:
//! - Remote document identifiers
//! - Wall-clock timestamps and freshness formatting
//! - The app bundle and session document model

mod bundle;
mod ids;
mod session;
mod timestamp;

pub use bundle::{AppBundle, Manifest, ParamMap, Schema};
pub use ids::DocumentId;
pub use session::{SessionRecord, SessionSummary};
pub use timestamp::{format_age, Timestamp};
