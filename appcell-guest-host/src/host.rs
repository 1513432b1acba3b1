//! The sandbox host state machine.

use crate::protocol::GuestMessage;
use crate::transport::{GuestContextId, GuestTransport, InboundEnvelope};
use appcell_sync::{SyncCoordinator, SyncResult};
use appcell_types::{AppBundle, DocumentId, SessionRecord};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the host persists guest state changes. Implemented by
/// [`SyncCoordinator`]; tests supply fakes.
#[async_trait]
pub trait SessionSink: Send + Sync {
    /// Persists a session to the remote store.
    async fn save_session(&self, app_id: &DocumentId, record: &SessionRecord) -> SyncResult<()>;
}

#[async_trait]
impl SessionSink for SyncCoordinator {
    async fn save_session(&self, app_id: &DocumentId, record: &SessionRecord) -> SyncResult<()> {
        SyncCoordinator::save_session(self, app_id, record).await
    }
}

/// Lifecycle phase of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPhase {
    /// Constructed, guest not yet rendered.
    Uninitialized,
    /// Guest rendered, waiting for its `ready`.
    AwaitingReady,
    /// Handshake complete; guest holds current state.
    Initialized,
    /// An `update-session` is being persisted.
    Saving,
    /// Unmounted. All further traffic is dropped.
    TornDown,
}

/// Manages the lifecycle of one guest execution context: renders it in
/// isolation, validates inbound messages by source identity, drives the
/// `ready` → `init` handshake, and persists guest state changes through the
/// injected [`SessionSink`].
///
/// Holds at most one current session; a switch fully replaces it before any
/// further guest message is processed.
pub struct SandboxHost {
    guest: GuestContextId,
    phase: HostPhase,
    app_id: DocumentId,
    manifest: Value,
    params: Value,
    html: String,
    current_session: Option<SessionRecord>,
    sink: Arc<dyn SessionSink>,
    transport: Arc<dyn GuestTransport>,
}

impl SandboxHost {
    /// Creates a host for the given bundle. The guest is not rendered until
    /// [`mount`](Self::mount).
    pub fn new(
        bundle: &AppBundle,
        sink: Arc<dyn SessionSink>,
        transport: Arc<dyn GuestTransport>,
    ) -> Self {
        Self {
            guest: GuestContextId::new(),
            phase: HostPhase::Uninitialized,
            app_id: bundle.id.clone(),
            manifest: serde_json::to_value(&bundle.manifest).unwrap_or(Value::Null),
            params: Value::Object(bundle.params.clone()),
            html: bundle.html.clone(),
            current_session: None,
            sink,
            transport,
        }
    }

    /// The context handle this host accepts messages from.
    #[must_use]
    pub fn guest(&self) -> GuestContextId {
        self.guest
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> HostPhase {
        self.phase
    }

    /// The session the guest is working against, if one is loaded.
    #[must_use]
    pub fn current_session(&self) -> Option<&SessionRecord> {
        self.current_session.as_ref()
    }

    /// Renders the guest context with the bundle HTML and starts waiting
    /// for its `ready`.
    pub fn mount(&mut self) {
        if self.phase != HostPhase::Uninitialized {
            debug!("mount ignored in phase {:?}", self.phase);
            return;
        }
        self.transport.render(&self.guest, &self.html);
        self.phase = HostPhase::AwaitingReady;
        info!("mounted guest {} for bundle {}", self.guest, self.app_id);
    }

    /// Fully replaces the current session. If the guest has already
    /// completed the handshake, `init` is re-sent with the new state; the
    /// guest is not re-mounted and `ready` is not re-solicited.
    pub fn switch_session(&mut self, session: SessionRecord) {
        self.current_session = Some(session);
        match self.phase {
            HostPhase::Initialized | HostPhase::Saving => self.send_init(),
            _ => {}
        }
    }

    /// Unmounts the host. The caller deregisters the inbound listener; any
    /// save still in flight completes and its acknowledgement is discarded.
    pub fn teardown(&mut self) {
        self.phase = HostPhase::TornDown;
        info!("tore down guest {}", self.guest);
    }

    /// Processes one inbound envelope.
    ///
    /// A message is accepted only if its source equals the context handle
    /// this host created; anything else is silently discarded with no state
    /// change and no reply.
    pub async fn handle_message(&mut self, envelope: InboundEnvelope) {
        if envelope.source != self.guest {
            debug!("discarding message from unrecognized context {}", envelope.source);
            return;
        }
        if self.phase == HostPhase::TornDown {
            debug!("discarding message after teardown");
            return;
        }

        let Some(message) = GuestMessage::parse(&envelope.payload) else {
            debug!("discarding non-protocol payload from guest {}", self.guest);
            return;
        };

        match message {
            GuestMessage::Ready => self.on_ready(),
            GuestMessage::UpdateSession { data, seq } => self.on_update_session(data, seq).await,
            GuestMessage::Init { .. } | GuestMessage::SessionSaved { .. } => {
                // Host-to-guest kinds reflected back; not valid inbound.
                debug!("discarding host-bound message kind from guest {}", self.guest);
            }
        }
    }

    fn on_ready(&mut self) {
        match self.phase {
            HostPhase::AwaitingReady | HostPhase::Initialized => {
                self.phase = HostPhase::Initialized;
                self.send_init();
            }
            _ => debug!("ready ignored in phase {:?}", self.phase),
        }
    }

    async fn on_update_session(&mut self, data: Value, seq: Option<u64>) {
        if self.phase != HostPhase::Initialized {
            debug!("update-session ignored in phase {:?}", self.phase);
            return;
        }
        let Some(session) = self.current_session.as_mut() else {
            debug!("update-session ignored: no session loaded");
            return;
        };

        // Optimistic: the in-memory value is replaced before the remote
        // write completes and is never rolled back on failure.
        session.data = data;
        let snapshot = session.clone();

        // Saving is transient within this call: the save is awaited while
        // the host is exclusively borrowed, so no other message or teardown
        // can interleave with it.
        self.phase = HostPhase::Saving;
        let result = self.sink.save_session(&self.app_id, &snapshot).await;
        self.phase = HostPhase::Initialized;

        let ack = match result {
            Ok(()) => GuestMessage::saved(seq),
            Err(err) => {
                warn!("session save failed for {}: {err}", snapshot.id);
                GuestMessage::save_failed(err.to_string(), seq)
            }
        };
        self.transport.send(&self.guest, &ack);
    }

    /// Sends `init` reflecting the state at this moment. The handshake
    /// never blocks on data availability: with no session loaded, the
    /// session payload is an empty object.
    fn send_init(&self) {
        let session = self
            .current_session
            .as_ref()
            .map(|s| s.data.clone())
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let init = GuestMessage::init(self.manifest.clone(), self.params.clone(), session);
        self.transport.send(&self.guest, &init);
    }
}
