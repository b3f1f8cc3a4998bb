//! Shared session state derived from authority events
//!
//! The [`SessionStore`] is the single writer of [`SessionState`]; view
//! consumers only read cloned snapshots or subscribe to the watch channel.
//! The store persists across reconnect cycles: a disconnect never resets
//! the last known session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::connection::ConnectionManager;
use crate::messages::AppState;

/// Latest known shared session state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    /// Identifier of the song the authority has loaded
    pub current_song: Option<String>,

    /// Whether the authority considers playback active
    pub is_playing: bool,

    /// Authority playback position in seconds
    pub position_seconds: f64,

    /// Most recent error, cleared by the next well-formed state event
    pub last_error: Option<String>,
}

impl SessionState {
    /// Replace this snapshot with an inbound state event.
    ///
    /// Without a song there is nothing to play: the playing flag and
    /// position are normalized accordingly.
    fn apply(&mut self, update: &AppState) {
        self.current_song = update.current_song.clone();
        if self.current_song.is_none() {
            self.is_playing = false;
            self.position_seconds = 0.0;
        } else {
            self.is_playing = update.is_playing;
            self.position_seconds = update.position.max(0.0);
        }
        self.last_error = None;
    }
}

/// Holds the latest reconciled session state for consumers
pub struct SessionStore {
    manager: ConnectionManager,
    shared: Arc<StoreShared>,
    poll_task: JoinHandle<()>,
}

struct StoreShared {
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionState>,
    connected: AtomicBool,
}

impl StoreShared {
    /// Mutate the state under the lock, then publish the full snapshot
    fn update(&self, mutate: impl FnOnce(&mut SessionState)) {
        let snapshot = {
            let mut state = self.state.lock();
            mutate(&mut state);
            state.clone()
        };
        self.updates.send_replace(snapshot);
    }
}

impl SessionStore {
    /// Create a store subscribed to the manager's event channels.
    ///
    /// `poll_interval` controls how often connectivity is refreshed; see
    /// [`Self::is_connected`].
    pub fn new(manager: ConnectionManager, poll_interval: Duration) -> Self {
        let (updates, _) = watch::channel(SessionState::default());
        let shared = Arc::new(StoreShared {
            state: Mutex::new(SessionState::default()),
            updates,
            connected: AtomicBool::new(false),
        });

        let on_state = Arc::clone(&shared);
        manager.on_app_state(move |update| {
            on_state.update(|state| state.apply(update));
        });

        let on_error = Arc::clone(&shared);
        manager.on_error(move |error| {
            let message = error.to_string();
            on_error.update(|state| state.last_error = Some(message));
        });

        let poll_shared = Arc::clone(&shared);
        let poll_manager = manager.clone();
        let poll_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                poll_shared
                    .connected
                    .store(poll_manager.is_connected(), Ordering::Relaxed);
            }
        });

        Self {
            manager,
            shared,
            poll_task,
        }
    }

    /// Clone of the current session state
    pub fn snapshot(&self) -> SessionState {
        self.shared.state.lock().clone()
    }

    /// Subscribe to state changes; every published value is a complete
    /// snapshot
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.updates.subscribe()
    }

    /// Last polled connectivity.
    ///
    /// Connectivity is sampled on a fixed interval rather than pushed, so
    /// the value may lag reality by up to one interval.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }

    /// User-facing recovery action: clear the last error and cycle the
    /// connection. Distinct from the transport's automatic retry loop.
    pub fn reconnect(&self) {
        tracing::info!("manual reconnect requested");
        self.shared.update(|state| state.last_error = None);
        self.manager.disconnect();
        self.manager.connect();
    }

    /// The connection manager this store observes
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.poll_task.abort();
    }
}
