//! Session documents.
//!
//! A session is one named, persisted state snapshot for a bundle. A bundle
//! has zero or more sessions; each is an independent file in the remote
//! store with no cross-session invariants.

use crate::{DocumentId, Timestamp};
use serde::{Deserialize, Serialize};

/// One persisted session for an app bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The session file's id in the remote store.
    pub id: DocumentId,
    /// User-facing session name.
    pub name: String,
    /// Creation time.
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    /// Guest-controlled state payload. Opaque to the host.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SessionRecord {
    /// Creates a new session record with the given payload.
    pub fn new(id: DocumentId, name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: Timestamp::now(),
            data,
        }
    }
}

/// Listing entry for a bundle's sessions, cheap to fetch and cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// The session file's id.
    pub id: DocumentId,
    /// User-facing session name.
    pub name: String,
}
