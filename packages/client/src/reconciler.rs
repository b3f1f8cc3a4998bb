//! Bidirectional playback reconciliation
//!
//! Keeps a local media surface in agreement with the remote session state
//! without creating correction loops: remote-driven corrections never emit
//! outbound messages, and user intents never mutate local play/pause state
//! directly — the authority's echo does.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::connection::ConnectionManager;
use crate::media::{MediaLoader, MediaSession, MediaSurface};
use crate::messages::Action;
use crate::session::SessionState;

/// Where reconciler intents are dispatched
pub trait OutboundSink: Send + Sync {
    fn dispatch(&self, action: Action);
}

impl OutboundSink for ConnectionManager {
    fn dispatch(&self, action: Action) {
        self.send(action);
    }
}

/// Reconciles a local media surface against remote session state
pub struct PlaybackReconciler<S, O> {
    surface: S,
    outbound: O,
    tolerance_seconds: f64,
}

impl<S: MediaSurface, O: OutboundSink> PlaybackReconciler<S, O> {
    pub fn new(surface: S, outbound: O, tolerance_seconds: f64) -> Self {
        Self {
            surface,
            outbound,
            tolerance_seconds,
        }
    }

    /// Compare the local surface against a remote snapshot and correct the
    /// surface where they disagree.
    ///
    /// Corrections are responses to remote truth, not new intents: this
    /// path never emits outbound messages.
    pub fn observe(&mut self, remote: &SessionState) {
        if remote.current_song.is_none() {
            if self.surface.is_playing() {
                self.surface.pause();
            }
            return;
        }

        let local = self.surface.position_seconds();
        let diff = (local - remote.position_seconds).abs();
        if diff > self.tolerance_seconds {
            tracing::debug!(
                local,
                remote = remote.position_seconds,
                "correcting local position"
            );
            self.surface.seek(remote.position_seconds);
        }

        // Play/pause follows the remote flag alone.
        match (remote.is_playing, self.surface.is_playing()) {
            (true, false) => self.surface.play(),
            (false, true) => self.surface.pause(),
            _ => {}
        }
    }

    /// A seek the user performed directly (drag, click).
    ///
    /// Unlike corrective seeks this announces the new position to the
    /// authority; the two paths are distinguished by origin, not magnitude.
    pub fn user_seek(&mut self, seconds: f64) {
        self.surface.seek(seconds);
        self.outbound.dispatch(Action::SeekAudio { time: seconds });
    }

    /// Ask the authority to start playback. Local state changes only when
    /// the remote flag echoes back.
    pub fn user_play(&self) {
        self.outbound.dispatch(Action::PlayAudio);
    }

    /// Ask the authority to pause playback
    pub fn user_pause(&self) {
        self.outbound.dispatch(Action::PauseAudio);
    }

    /// Ask the authority to stop playback
    pub fn user_stop(&self) {
        self.outbound.dispatch(Action::StopAudio);
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

/// Drive a reconciler from store updates and a periodic local observation
/// tick, swapping the media resource whenever the session's song changes.
///
/// Runs until the store side of `updates` is dropped; the media resource is
/// released on every exit path.
pub async fn run_sync_loop<O: OutboundSink>(
    reconciler: Arc<Mutex<PlaybackReconciler<MediaSession, O>>>,
    loader: MediaLoader,
    mut updates: watch::Receiver<SessionState>,
    observe_interval: Duration,
) {
    let mut interval = tokio::time::interval(observe_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut current_song: Option<String> = None;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = interval.tick() => {}
        }

        let snapshot = updates.borrow().clone();
        if snapshot.current_song != current_song {
            swap_song(&reconciler, &loader, snapshot.current_song.as_deref()).await;
            current_song = snapshot.current_song.clone();
        }
        reconciler.lock().observe(&snapshot);
    }

    reconciler.lock().surface_mut().release();
    tracing::debug!("sync loop finished");
}

/// Release the current resource and acquire the next song's, if any.
///
/// Load failures are logged and clear the loading flag; they are not
/// retried — the next song change triggers the next load.
async fn swap_song<O: OutboundSink>(
    reconciler: &Arc<Mutex<PlaybackReconciler<MediaSession, O>>>,
    loader: &MediaLoader,
    song: Option<&str>,
) {
    {
        let mut reconciler = reconciler.lock();
        reconciler.surface_mut().release();
        reconciler.surface_mut().set_loading(song.is_some());
    }

    let Some(song_id) = song else { return };

    match loader.load(song_id).await {
        Ok(media) => reconciler.lock().surface_mut().attach(media),
        Err(e) => {
            tracing::warn!(song = %song_id, error = %e, "media load failed");
            reconciler.lock().surface_mut().set_loading(false);
        }
    }
}
