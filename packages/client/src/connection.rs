//! Connection management for the show authority session
//!
//! The [`ConnectionManager`] owns the transport, tracks connectivity, and
//! fans inbound events out to registered listeners. One manager is
//! constructed at the application root and shared by cloning; clones are
//! cheap handles onto the same connection.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::error::ClientError;
use crate::messages::{describe_error, Action, AppState, ServerEvent};
use crate::transport::{
    DisconnectReason, ReconnectPolicy, TransportEvent, TransportFactory, TransportHandle,
    WsTransportFactory,
};

/// Connectivity of the session transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

type AppStateListener = Arc<dyn Fn(&AppState) + Send + Sync>;
type ErrorListener = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// Manages the persistent connection to the show authority
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    url: Url,
    policy: ReconnectPolicy,
    factory: Arc<dyn TransportFactory>,

    state: Mutex<ConnectionState>,
    transport: Mutex<Option<TransportHandle>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,

    /// Bumped on every disconnect so a stale dispatcher can tell it has
    /// been superseded and must stop touching shared state.
    epoch: AtomicU64,

    attempt_count: AtomicU32,
    exhausted_reported: AtomicBool,

    app_state_listeners: Mutex<Vec<AppStateListener>>,
    error_listeners: Mutex<Vec<ErrorListener>>,
}

impl ConnectionManager {
    /// Create a manager using the production websocket transport
    pub fn new(url: Url, policy: ReconnectPolicy) -> Self {
        Self::with_factory(url, policy, Arc::new(WsTransportFactory))
    }

    /// Create a manager with a custom transport factory
    pub fn with_factory(
        url: Url,
        policy: ReconnectPolicy,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                url,
                policy,
                factory,
                state: Mutex::new(ConnectionState::Disconnected),
                transport: Mutex::new(None),
                dispatch: Mutex::new(None),
                epoch: AtomicU64::new(0),
                attempt_count: AtomicU32::new(0),
                exhausted_reported: AtomicBool::new(false),
                app_state_listeners: Mutex::new(Vec::new()),
                error_listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Open the transport.
    ///
    /// Idempotent: calling while already connecting or connected is a
    /// logged no-op, not an error.
    pub fn connect(&self) {
        let epoch;
        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::Disconnected {
                tracing::debug!(state = %*state, "connect() ignored, connection already active");
                return;
            }
            *state = ConnectionState::Connecting;
            epoch = self.inner.epoch.load(Ordering::SeqCst);
        }

        self.inner.attempt_count.store(0, Ordering::SeqCst);
        self.inner.exhausted_reported.store(false, Ordering::SeqCst);

        let session_id = Uuid::new_v4();
        tracing::info!(%session_id, url = %self.inner.url, "opening transport");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = self
            .inner
            .factory
            .spawn(&self.inner.url, &self.inner.policy, events_tx);
        *self.inner.transport.lock() = Some(handle);

        let inner = Arc::clone(&self.inner);
        let dispatch = tokio::spawn(dispatch_events(inner, session_id, epoch, events_rx));
        if let Some(stale) = self.inner.dispatch.lock().replace(dispatch) {
            // A previous dispatcher either drained on its own or was
            // aborted by disconnect(); its handle is no longer needed.
            drop(stale);
        }
    }

    /// Tear the transport down.
    ///
    /// Cancels any in-flight reconnection attempt and releases the handle
    /// so a subsequent `connect()` starts fresh. Safe to call with no
    /// active connection.
    pub fn disconnect(&self) {
        let handle = self.inner.transport.lock().take();
        let Some(handle) = handle else {
            tracing::debug!("disconnect() ignored, no active transport");
            return;
        };

        {
            let mut state = self.inner.state.lock();
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            *state = ConnectionState::Disconnected;
        }

        if let Some(dispatch) = self.inner.dispatch.lock().take() {
            dispatch.abort();
        }
        handle.shutdown();
        tracing::info!("transport released");
    }

    /// Send an action to the authority.
    ///
    /// When the transport is not connected the message is dropped and a
    /// [`ClientError::NotConnected`] is reported through the error
    /// listeners; this method itself never fails.
    pub fn send(&self, action: Action) {
        if *self.inner.state.lock() != ConnectionState::Connected {
            tracing::warn!(action = action.tag(), "dropping message, not connected");
            self.inner.notify_error(&ClientError::NotConnected);
            return;
        }

        let result = {
            let transport = self.inner.transport.lock();
            match transport.as_ref() {
                Some(handle) => handle.send(action.into_message()),
                None => Err(ClientError::NotConnected),
            }
        };

        if let Err(e) = result {
            self.inner.notify_error(&e);
        }
    }

    /// Register a listener for application-state events.
    ///
    /// All registered listeners are invoked, in registration order, for
    /// every event. A panicking listener is isolated and logged.
    pub fn on_app_state(&self, listener: impl Fn(&AppState) + Send + Sync + 'static) {
        self.inner
            .app_state_listeners
            .lock()
            .push(Arc::new(listener));
    }

    /// Register a listener for error events; same fan-out rules as
    /// [`Self::on_app_state`]
    pub fn on_error(&self, listener: impl Fn(&ClientError) + Send + Sync + 'static) {
        self.inner.error_listeners.lock().push(Arc::new(listener));
    }

    /// Current connectivity
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Whether the transport is currently connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether a transport handle currently exists
    pub fn has_transport(&self) -> bool {
        self.inner.transport.lock().is_some()
    }

    /// Failed connection attempts since the last successful handshake
    pub fn failed_attempts(&self) -> u32 {
        self.inner.attempt_count.load(Ordering::SeqCst)
    }
}

impl ManagerInner {
    /// Set the connection state unless this dispatcher has been superseded
    fn apply_state(&self, epoch: u64, new_state: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        *state = new_state;
        true
    }

    fn notify_app_state(&self, update: &AppState) {
        let listeners: Vec<AppStateListener> = self.app_state_listeners.lock().clone();
        for (index, listener) in listeners.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| listener(update))).is_err() {
                let failure = ClientError::CallbackFailure {
                    context: "app_state",
                };
                tracing::error!(listener = index, error = %failure, "listener failure isolated");
            }
        }
    }

    fn notify_error(&self, error: &ClientError) {
        let listeners: Vec<ErrorListener> = self.error_listeners.lock().clone();
        for (index, listener) in listeners.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| listener(error))).is_err() {
                let failure = ClientError::CallbackFailure { context: "error" };
                tracing::error!(listener = index, error = %failure, "listener failure isolated");
            }
        }
    }
}

/// Drain one transport session's events, in arrival order
async fn dispatch_events(
    inner: Arc<ManagerInner>,
    session_id: Uuid,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Connected => {
                if !inner.apply_state(epoch, ConnectionState::Connected) {
                    break;
                }
                inner.attempt_count.store(0, Ordering::SeqCst);
                tracing::info!(%session_id, "connected to show authority");
            }
            TransportEvent::Disconnected { reason, detail } => {
                if !inner.apply_state(epoch, ConnectionState::Disconnected) {
                    break;
                }
                let detail = detail.unwrap_or_else(|| "none".to_string());
                match reason {
                    DisconnectReason::ServerClosed => {
                        tracing::info!(%session_id, %detail, "authority closed the connection");
                    }
                    DisconnectReason::ConnectionLost => {
                        tracing::warn!(%session_id, %detail, "connection lost");
                    }
                    DisconnectReason::Requested => {
                        tracing::debug!(%session_id, "transport shut down");
                    }
                }
            }
            TransportEvent::ConnectError { detail } => {
                let max = inner.policy.max_attempts;
                let attempts = {
                    let previous = inner.attempt_count.load(Ordering::SeqCst);
                    if previous >= max {
                        previous
                    } else {
                        inner.attempt_count.fetch_add(1, Ordering::SeqCst) + 1
                    }
                };
                tracing::warn!(%session_id, attempts, %detail, "connection attempt failed");

                if attempts >= max && !inner.exhausted_reported.swap(true, Ordering::SeqCst) {
                    inner.apply_state(epoch, ConnectionState::Disconnected);
                    inner.notify_error(&ClientError::ReconnectionExhausted { attempts });
                }
            }
            TransportEvent::Event(ServerEvent::AppState { data }) => {
                inner.notify_app_state(&data);
            }
            TransportEvent::Event(ServerEvent::Error { error }) => {
                inner.notify_error(&ClientError::Authority(describe_error(&error)));
            }
        }
    }

    tracing::debug!(%session_id, "event dispatch finished");
}
