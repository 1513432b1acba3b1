//! Guest protocol messages.
//!
//! The wire format is a plain JSON object with a mandatory `type` field,
//! one of exactly `ready`, `init`, `update-session`, `session-saved`.
//! Anything else is not a protocol message and is ignored at the boundary.
//!
//! `seq` is an optional correlation number: a guest that issues rapid
//! consecutive updates can tag each `update-session` and match the echoed
//! value on `session-saved`. Guests that omit it see the original
//! three-field format byte for byte.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message exchanged between host and guest, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GuestMessage {
    /// Guest scripts are loaded and listening.
    Ready,

    /// Host delivers the bundle's static config and the current session
    /// state. Sent in reply to `ready` and again on every session switch.
    Init {
        manifest: Value,
        params: Value,
        session: Value,
    },

    /// Guest requests persistence of its new session state. `data` is an
    /// opaque, schema-free blob the guest controls entirely.
    UpdateSession {
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },

    /// Host reports the outcome of a persistence attempt.
    SessionSaved {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
    },
}

impl GuestMessage {
    /// Parses an inbound payload, returning `None` for anything that is not
    /// one of the four known message kinds.
    #[must_use]
    pub fn parse(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }

    /// Builds an `init` message.
    pub fn init(manifest: Value, params: Value, session: Value) -> Self {
        Self::Init {
            manifest,
            params,
            session,
        }
    }

    /// Builds a successful `session-saved` acknowledgement.
    pub fn saved(seq: Option<u64>) -> Self {
        Self::SessionSaved {
            success: true,
            error: None,
            seq,
        }
    }

    /// Builds a failed `session-saved` acknowledgement.
    pub fn save_failed(error: impl Into<String>, seq: Option<u64>) -> Self {
        Self::SessionSaved {
            success: false,
            error: Some(error.into()),
            seq,
        }
    }
}
