//! Sandboxed guest messaging for Appcell.
//!
//! A guest is an isolated, script-capable execution context running a
//! bundle's HTML with no same-origin privileges. The host exchanges a
//! closed set of four messages with it:
//!
//! 1. guest sends `ready` once its scripts are up
//! 2. host replies `init` with manifest, params, and the current session
//! 3. guest sends `update-session` whenever its state changes
//! 4. host persists the state and acknowledges with `session-saved`
//!
//! The only trust boundary is source identity: an inbound message is
//! processed only if it originates from the exact context the host created.
//! Everything else is silently discarded — under normal browser activity
//! other contexts do post messages, so this is not an error condition.

mod host;
mod protocol;
mod transport;

pub use host::{HostPhase, SandboxHost, SessionSink};
pub use protocol::GuestMessage;
pub use transport::{GuestContextId, GuestTransport, InboundEnvelope};
