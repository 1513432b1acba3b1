use appcell_guest_host::{
    GuestContextId, GuestMessage, GuestTransport, HostPhase, InboundEnvelope, SandboxHost,
    SessionSink,
};
use appcell_sync::{SyncError, SyncResult};
use appcell_types::{AppBundle, DocumentId, Manifest, ParamMap, SessionRecord, Timestamp};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingTransport {
    rendered: Mutex<Vec<(GuestContextId, String)>>,
    sent: Mutex<Vec<(GuestContextId, GuestMessage)>>,
}

impl RecordingTransport {
    fn sent_messages(&self) -> Vec<GuestMessage> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl GuestTransport for RecordingTransport {
    fn render(&self, guest: &GuestContextId, html: &str) {
        self.rendered.lock().unwrap().push((*guest, html.to_string()));
    }

    fn send(&self, guest: &GuestContextId, message: &GuestMessage) {
        self.sent.lock().unwrap().push((*guest, message.clone()));
    }
}

#[derive(Default)]
struct FakeSink {
    saved: Mutex<Vec<SessionRecord>>,
    fail: AtomicBool,
}

#[async_trait]
impl SessionSink for FakeSink {
    async fn save_session(&self, _app_id: &DocumentId, record: &SessionRecord) -> SyncResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteStore {
                status: 503,
                message: "store unavailable".to_string(),
            });
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn bundle() -> AppBundle {
    AppBundle {
        id: DocumentId::new("app1"),
        manifest: Manifest {
            name: "counter".to_string(),
            version: "1.0".to_string(),
            params: ParamMap::new(),
            session_schema: Value::Null,
        },
        params: ParamMap::new(),
        html: "<html><script>boot()</script></html>".to_string(),
    }
}

fn session(id: &str, data: Value) -> SessionRecord {
    SessionRecord {
        id: DocumentId::new(id),
        name: format!("session {id}"),
        created_at: Timestamp::from_millis(1_700_000_000_000),
        data,
    }
}

fn host_with(
    transport: Arc<RecordingTransport>,
    sink: Arc<FakeSink>,
) -> SandboxHost {
    SandboxHost::new(&bundle(), sink, transport)
}

fn from_guest(host: &SandboxHost, payload: Value) -> InboundEnvelope {
    InboundEnvelope {
        source: host.guest(),
        payload,
    }
}

// ── Mount and handshake ─────────────────────────────────────────

#[tokio::test]
async fn mount_renders_guest_html() {
    let transport = Arc::new(RecordingTransport::default());
    let mut host = host_with(transport.clone(), Arc::new(FakeSink::default()));

    assert_eq!(host.phase(), HostPhase::Uninitialized);
    host.mount();
    assert_eq!(host.phase(), HostPhase::AwaitingReady);

    let rendered = transport.rendered.lock().unwrap();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].0, host.guest());
    assert!(rendered[0].1.contains("boot()"));
}

#[tokio::test]
async fn ready_before_session_load_inits_with_empty_object() {
    let transport = Arc::new(RecordingTransport::default());
    let mut host = host_with(transport.clone(), Arc::new(FakeSink::default()));
    host.mount();

    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;

    assert_eq!(host.phase(), HostPhase::Initialized);
    let sent = transport.sent_messages();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        GuestMessage::Init { session, manifest, .. } => {
            assert_eq!(*session, json!({}));
            assert_eq!(manifest["name"], "counter");
        }
        other => panic!("expected init, got {other:?}"),
    }
}

#[tokio::test]
async fn repeated_ready_reflects_state_at_each_send() {
    let transport = Arc::new(RecordingTransport::default());
    let mut host = host_with(transport.clone(), Arc::new(FakeSink::default()));
    host.mount();

    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;
    host.switch_session(session("s1", json!({"count": 5})));
    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;

    let sent = transport.sent_messages();
    // init (empty), init (switch), init (second ready)
    assert_eq!(sent.len(), 3);
    let sessions: Vec<&Value> = sent
        .iter()
        .map(|m| match m {
            GuestMessage::Init { session, .. } => session,
            other => panic!("expected init, got {other:?}"),
        })
        .collect();
    assert_eq!(*sessions[0], json!({}));
    assert_eq!(*sessions[1], json!({"count": 5}));
    assert_eq!(*sessions[2], json!({"count": 5}));
}

#[tokio::test]
async fn switch_before_ready_sends_nothing() {
    let transport = Arc::new(RecordingTransport::default());
    let mut host = host_with(transport.clone(), Arc::new(FakeSink::default()));
    host.mount();

    host.switch_session(session("s1", json!({"a": 1})));
    assert!(transport.sent_messages().is_empty());

    // The later ready picks up the already-loaded session.
    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;
    match &transport.sent_messages()[0] {
        GuestMessage::Init { session, .. } => assert_eq!(*session, json!({"a": 1})),
        other => panic!("expected init, got {other:?}"),
    }
}

// ── update-session ──────────────────────────────────────────────

#[tokio::test]
async fn update_session_persists_and_acknowledges() {
    let transport = Arc::new(RecordingTransport::default());
    let sink = Arc::new(FakeSink::default());
    let mut host = host_with(transport.clone(), sink.clone());
    host.mount();
    host.switch_session(session("s1", json!({"count": 0})));
    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;

    host.handle_message(from_guest(
        &host,
        json!({"type": "update-session", "data": {"count": 3}}),
    ))
    .await;

    assert_eq!(host.phase(), HostPhase::Initialized);
    assert_eq!(host.current_session().unwrap().data, json!({"count": 3}));

    let saved = sink.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].data, json!({"count": 3}));

    let last = transport.sent_messages().pop().unwrap();
    assert_eq!(
        last,
        GuestMessage::SessionSaved {
            success: true,
            error: None,
            seq: None
        }
    );
}

#[tokio::test]
async fn failed_save_acks_error_without_rollback() {
    let transport = Arc::new(RecordingTransport::default());
    let sink = Arc::new(FakeSink::default());
    let mut host = host_with(transport.clone(), sink.clone());
    host.mount();
    host.switch_session(session("s1", json!({"count": 0})));
    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;

    sink.fail.store(true, Ordering::SeqCst);
    host.handle_message(from_guest(
        &host,
        json!({"type": "update-session", "data": {"count": 9}}),
    ))
    .await;

    // Optimistically applied, never rolled back.
    assert_eq!(host.current_session().unwrap().data, json!({"count": 9}));

    let last = transport.sent_messages().pop().unwrap();
    match last {
        GuestMessage::SessionSaved {
            success: false,
            error: Some(error),
            seq: None,
        } => assert!(error.contains("store unavailable")),
        other => panic!("expected failed ack, got {other:?}"),
    }
}

#[tokio::test]
async fn seq_is_echoed_on_acknowledgement() {
    let transport = Arc::new(RecordingTransport::default());
    let mut host = host_with(transport.clone(), Arc::new(FakeSink::default()));
    host.mount();
    host.switch_session(session("s1", json!({})));
    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;

    host.handle_message(from_guest(
        &host,
        json!({"type": "update-session", "data": {}, "seq": 42}),
    ))
    .await;

    let last = transport.sent_messages().pop().unwrap();
    assert_eq!(
        last,
        GuestMessage::SessionSaved {
            success: true,
            error: None,
            seq: Some(42)
        }
    );
}

#[tokio::test]
async fn ready_after_save_inits_with_updated_session() {
    let transport = Arc::new(RecordingTransport::default());
    let mut host = host_with(transport.clone(), Arc::new(FakeSink::default()));
    host.mount();
    host.switch_session(session("s1", json!({"count": 0})));
    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;

    host.handle_message(from_guest(
        &host,
        json!({"type": "update-session", "data": {"count": 4}}),
    ))
    .await;
    assert_eq!(host.phase(), HostPhase::Initialized);

    // A ready right after the save observes the optimistically updated
    // session, never an intermediate saving state.
    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;
    match transport.sent_messages().pop().unwrap() {
        GuestMessage::Init { session, .. } => assert_eq!(session, json!({"count": 4})),
        other => panic!("expected init, got {other:?}"),
    }
}

#[tokio::test]
async fn update_before_handshake_is_dropped() {
    let transport = Arc::new(RecordingTransport::default());
    let sink = Arc::new(FakeSink::default());
    let mut host = host_with(transport.clone(), sink.clone());
    host.mount();
    host.switch_session(session("s1", json!({"count": 0})));

    host.handle_message(from_guest(
        &host,
        json!({"type": "update-session", "data": {"count": 1}}),
    ))
    .await;

    assert!(sink.saved.lock().unwrap().is_empty());
    assert!(transport.sent_messages().is_empty());
    assert_eq!(host.current_session().unwrap().data, json!({"count": 0}));
}

// ── Trust boundary ──────────────────────────────────────────────

#[tokio::test]
async fn message_from_unrecognized_context_is_ignored() {
    let transport = Arc::new(RecordingTransport::default());
    let mut host = host_with(transport.clone(), Arc::new(FakeSink::default()));
    host.mount();

    host.handle_message(InboundEnvelope {
        source: GuestContextId::new(),
        payload: json!({"type": "ready"}),
    })
    .await;

    // State unchanged, no reply.
    assert_eq!(host.phase(), HostPhase::AwaitingReady);
    assert!(transport.sent_messages().is_empty());
}

#[tokio::test]
async fn non_protocol_payload_is_ignored() {
    let transport = Arc::new(RecordingTransport::default());
    let mut host = host_with(transport.clone(), Arc::new(FakeSink::default()));
    host.mount();

    host.handle_message(from_guest(&host, json!({"type": "telemetry", "x": 1})))
        .await;
    host.handle_message(from_guest(&host, json!(17)))
        .await;

    assert_eq!(host.phase(), HostPhase::AwaitingReady);
    assert!(transport.sent_messages().is_empty());
}

#[tokio::test]
async fn host_bound_kinds_are_not_accepted_inbound() {
    let transport = Arc::new(RecordingTransport::default());
    let mut host = host_with(transport.clone(), Arc::new(FakeSink::default()));
    host.mount();

    host.handle_message(from_guest(
        &host,
        json!({"type": "init", "manifest": {}, "params": {}, "session": {}}),
    ))
    .await;
    host.handle_message(from_guest(
        &host,
        json!({"type": "session-saved", "success": true}),
    ))
    .await;

    assert_eq!(host.phase(), HostPhase::AwaitingReady);
    assert!(transport.sent_messages().is_empty());
}

// ── Teardown ────────────────────────────────────────────────────

#[tokio::test]
async fn teardown_drops_all_further_traffic() {
    let transport = Arc::new(RecordingTransport::default());
    let sink = Arc::new(FakeSink::default());
    let mut host = host_with(transport.clone(), sink.clone());
    host.mount();
    host.switch_session(session("s1", json!({})));
    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;
    let sent_before = transport.sent_messages().len();

    host.teardown();
    assert_eq!(host.phase(), HostPhase::TornDown);

    host.handle_message(from_guest(&host, json!({"type": "ready"})))
        .await;
    host.handle_message(from_guest(
        &host,
        json!({"type": "update-session", "data": {"x": 1}}),
    ))
    .await;

    assert_eq!(transport.sent_messages().len(), sent_before);
    assert!(sink.saved.lock().unwrap().is_empty());
}
