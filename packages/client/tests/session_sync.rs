//! Connection-layer tests against a scripted transport
//!
//! These tests drive the manager and store the way a real transport would,
//! one event at a time, and assert the externally observable contract.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use url::Url;

use showlink_client::{
    Action, AppState, ConnectionManager, ConnectionState, PlaybackReconciler, ReconnectPolicy,
    ServerEvent, SessionStore, TransportEvent,
};
use showlink_test_utils::{wait_until, RecordingSink, ScriptedSurface, ScriptedTransport};

fn manager_with(transport: &ScriptedTransport, max_attempts: u32) -> ConnectionManager {
    let url = Url::parse("ws://localhost:5000/ws").unwrap();
    let policy = ReconnectPolicy {
        max_attempts,
        base_delay: Duration::from_millis(10),
        handshake_timeout: Duration::from_millis(100),
    };
    ConnectionManager::with_factory(url, policy, Arc::new(transport.clone()))
}

fn app_state(song: Option<&str>, is_playing: bool, position: f64) -> TransportEvent {
    TransportEvent::Event(ServerEvent::AppState {
        data: AppState {
            current_song: song.map(String::from),
            is_playing,
            position,
        },
    })
}

fn authority_error(message: &str) -> TransportEvent {
    TransportEvent::Event(ServerEvent::Error {
        error: json!(message),
    })
}

#[tokio::test]
async fn test_connected_only_with_live_transport() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(!manager.has_transport());

    manager.connect();
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert!(manager.has_transport());

    transport.emit(TransportEvent::Connected);
    assert!(wait_until(|| manager.state() == ConnectionState::Connected).await);
    assert!(manager.has_transport());

    // A successful handshake must not be followed by a spurious
    // disconnected report.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(manager.state(), ConnectionState::Connected);

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(!manager.has_transport());
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);

    manager.connect();
    transport.emit(TransportEvent::Connected);
    assert!(wait_until(|| manager.is_connected()).await);

    manager.connect();
    manager.connect();

    assert_eq!(transport.spawn_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_disconnect_without_connection_is_noop() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(transport.spawn_count(), 0);
}

#[tokio::test]
async fn test_send_while_disconnected_reports_not_connected() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);

    let errors: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen = Arc::clone(&errors);
    manager.on_error(move |error| seen.lock().push(error.to_string()));

    manager.send(Action::PlayAudio);

    let recorded = errors.lock().clone();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].contains("not connected"));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_send_forwards_envelope_verbatim() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);

    manager.connect();
    transport.emit(TransportEvent::Connected);
    assert!(wait_until(|| manager.is_connected()).await);

    manager.send(Action::SeekAudio { time: 22.3 });

    assert!(wait_until(|| transport.sent().len() == 1).await);
    let sent = transport.sent();
    assert_eq!(sent[0].action, "seek_audio");
    assert_eq!(sent[0].params.get("time"), Some(&json!(22.3)));
}

#[tokio::test]
async fn test_panicking_listener_does_not_block_delivery() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);

    manager.on_app_state(|_| panic!("listener exploded"));

    let delivered: Arc<Mutex<Vec<AppState>>> = Arc::default();
    let seen = Arc::clone(&delivered);
    manager.on_app_state(move |update| seen.lock().push(update.clone()));

    manager.connect();
    transport.emit(TransportEvent::Connected);
    transport.emit(app_state(Some("born_slippy"), true, 5.0));

    assert!(wait_until(|| delivered.lock().len() == 1).await);
    let update = delivered.lock()[0].clone();
    assert_eq!(update.current_song.as_deref(), Some("born_slippy"));
    assert!(update.is_playing);
}

#[tokio::test]
async fn test_reconnection_exhaustion_reported_once() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 3);

    let errors: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen = Arc::clone(&errors);
    manager.on_error(move |error| seen.lock().push(error.to_string()));

    manager.connect();
    for _ in 0..5 {
        transport.emit(TransportEvent::ConnectError {
            detail: "connection refused".to_string(),
        });
    }

    assert!(
        wait_until(|| errors.lock().iter().any(|e| e.contains("gave up"))).await
    );
    // Let the remaining scripted failures drain before counting.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let recorded = errors.lock().clone();
    assert_eq!(
        recorded.iter().filter(|e| e.contains("gave up")).count(),
        1
    );
    assert_eq!(manager.failed_attempts(), 3);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_store_tracks_session_state() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);
    let store = SessionStore::new(manager.clone(), Duration::from_millis(10));

    manager.connect();
    transport.emit(TransportEvent::Connected);
    transport.emit(app_state(Some("born_slippy"), true, 12.5));

    assert!(wait_until(|| store.snapshot().current_song.is_some()).await);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_song.as_deref(), Some("born_slippy"));
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.position_seconds, 12.5);
    assert!(snapshot.last_error.is_none());

    transport.emit(authority_error("Unknown action: warp_audio"));
    assert!(wait_until(|| store.snapshot().last_error.is_some()).await);

    // An error event only touches last_error.
    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_song.as_deref(), Some("born_slippy"));
    assert!(snapshot.is_playing);
    assert!(snapshot
        .last_error
        .as_deref()
        .unwrap()
        .contains("Unknown action"));

    // The next well-formed state event clears it.
    transport.emit(app_state(Some("born_slippy"), false, 30.0));
    assert!(wait_until(|| store.snapshot().last_error.is_none()).await);
    assert!(!store.snapshot().is_playing);
}

#[tokio::test]
async fn test_store_normalizes_null_song_events() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);
    let store = SessionStore::new(manager.clone(), Duration::from_millis(10));

    manager.connect();
    transport.emit(TransportEvent::Connected);
    transport.emit(app_state(Some("born_slippy"), true, 50.0));
    assert!(wait_until(|| store.snapshot().current_song.is_some()).await);

    // A malformed authority could claim playback without a song; the
    // store must normalize it.
    transport.emit(app_state(None, true, 99.0));
    assert!(wait_until(|| store.snapshot().current_song.is_none()).await);

    let snapshot = store.snapshot();
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.position_seconds, 0.0);
}

#[tokio::test]
async fn test_store_persists_across_disconnect() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);
    let store = SessionStore::new(manager.clone(), Duration::from_millis(10));

    manager.connect();
    transport.emit(TransportEvent::Connected);
    transport.emit(app_state(Some("born_slippy"), true, 12.5));
    assert!(wait_until(|| store.snapshot().current_song.is_some()).await);

    manager.disconnect();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.current_song.as_deref(), Some("born_slippy"));
    assert_eq!(snapshot.position_seconds, 12.5);
}

#[tokio::test]
async fn test_store_polls_connectivity() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);
    let store = SessionStore::new(manager.clone(), Duration::from_millis(10));

    assert!(!store.is_connected());

    manager.connect();
    transport.emit(TransportEvent::Connected);
    assert!(wait_until(|| store.is_connected()).await);

    manager.disconnect();
    assert!(wait_until(|| !store.is_connected()).await);
}

#[tokio::test]
async fn test_manual_reconnect_clears_error_and_cycles_transport() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);
    let store = SessionStore::new(manager.clone(), Duration::from_millis(10));

    manager.connect();
    transport.emit(TransportEvent::Connected);
    transport.emit(authority_error("backend fell over"));
    assert!(wait_until(|| store.snapshot().last_error.is_some()).await);

    store.reconnect();

    assert!(store.snapshot().last_error.is_none());
    assert_eq!(transport.spawn_count(), 2);
    assert_eq!(manager.state(), ConnectionState::Connecting);
}

#[tokio::test]
async fn test_store_snapshot_drives_reconciler() {
    let transport = ScriptedTransport::new();
    let manager = manager_with(&transport, 5);
    let store = SessionStore::new(manager.clone(), Duration::from_millis(10));

    manager.connect();
    transport.emit(TransportEvent::Connected);
    transport.emit(app_state(Some("born_slippy"), false, 40.0));
    assert!(wait_until(|| store.snapshot().current_song.is_some()).await);

    let sink = RecordingSink::new();
    let mut reconciler =
        PlaybackReconciler::new(ScriptedSurface::at_position(10.0), sink.clone(), 0.5);

    reconciler.observe(&store.snapshot());

    assert_eq!(reconciler.surface().seeks, vec![40.0]);
    assert!(sink.actions().is_empty());
}
