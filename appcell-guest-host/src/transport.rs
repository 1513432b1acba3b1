//! Transport seam between host and guest execution contexts.
//!
//! The underlying channel is whatever the embedding platform provides
//! (a cross-context structured-message channel in a browser shell). The
//! host only needs two capabilities: render a context with some HTML, and
//! deliver a message to that exact context. Inbound traffic arrives as
//! envelopes carrying the sender's context handle, which is the identity
//! the host validates against.

use crate::protocol::GuestMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque handle identifying one guest execution context.
///
/// Equality of this handle is the sole trust boundary between host and
/// guest: delivery targeting is best-effort, but acceptance is by exact
/// source identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestContextId(Uuid);

impl GuestContextId {
    /// Allocates a fresh context handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GuestContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GuestContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound side of the guest channel.
pub trait GuestTransport: Send + Sync {
    /// Mounts the isolated context with the given HTML as its sole content.
    fn render(&self, guest: &GuestContextId, html: &str);

    /// Delivers a message to the given context. Fire-and-forget: delivery
    /// failures are invisible to the host, as with a posted browser message.
    fn send(&self, guest: &GuestContextId, message: &GuestMessage);
}

/// An inbound message as handed to the host by the event loop.
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    /// The context the message came from.
    pub source: GuestContextId,
    /// Raw payload, not yet validated as a protocol message.
    pub payload: serde_json::Value,
}
