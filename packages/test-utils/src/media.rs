//! Scripted media surface and recording sink for reconciler tests

use std::sync::Arc;

use parking_lot::Mutex;

use showlink_client::{Action, MediaSurface, OutboundSink};

/// A media surface whose position and playing flag are set by the test.
///
/// Every playback operation is recorded so tests can assert exactly which
/// corrections the reconciler performed.
#[derive(Debug, Default)]
pub struct ScriptedSurface {
    position: f64,
    playing: bool,

    /// Positions passed to `seek`, in call order
    pub seeks: Vec<f64>,
    /// Number of `play` calls
    pub plays: u32,
    /// Number of `pause` calls
    pub pauses: u32,
    /// Number of `stop` calls
    pub stops: u32,
}

impl ScriptedSurface {
    /// A paused surface at the given position
    pub fn at_position(position: f64) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// A playing surface at the given position
    pub fn playing_at(position: f64) -> Self {
        Self {
            position,
            playing: true,
            ..Self::default()
        }
    }

    /// Move the simulated position without recording a seek
    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }
}

impl MediaSurface for ScriptedSurface {
    fn position_seconds(&self) -> f64 {
        self.position
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn seek(&mut self, seconds: f64) {
        self.seeks.push(seconds);
        self.position = seconds;
    }

    fn play(&mut self) {
        self.plays += 1;
        self.playing = true;
    }

    fn pause(&mut self) {
        self.pauses += 1;
        self.playing = false;
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.playing = false;
        self.position = 0.0;
    }
}

/// An outbound sink that records every dispatched action
#[derive(Clone, Default)]
pub struct RecordingSink {
    actions: Arc<Mutex<Vec<Action>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions dispatched so far, in order
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }
}

impl OutboundSink for RecordingSink {
    fn dispatch(&self, action: Action) {
        self.actions.lock().push(action);
    }
}
