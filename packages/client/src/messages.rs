//! Wire protocol for the show authority session
//!
//! Inbound frames are JSON objects tagged by `type`; outbound frames are a
//! generic `{action, params}` envelope. Messages are serialized as JSON
//! text frames over the websocket.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// =============================================================================
// Client -> Server Messages
// =============================================================================

/// Outbound message envelope.
///
/// The envelope is deliberately generic: any action/params pair is
/// transmitted uninterpreted, and validation is the authority's concern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    /// Action tag routed by the authority
    pub action: String,

    /// Action parameters
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Actions the client knows how to construct.
///
/// Known playback intents carry typed parameters; anything else goes through
/// [`Action::Custom`] for forward compatibility with newer authorities.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Seek playback to an absolute position in seconds
    SeekAudio { time: f64 },

    /// Start playback
    PlayAudio,

    /// Pause playback
    PauseAudio,

    /// Stop playback and rewind
    StopAudio,

    /// Send a chat line to the show assistant
    ChatMessage { text: String },

    /// An action this client has no typed knowledge of
    Custom {
        action: String,
        params: Map<String, Value>,
    },
}

impl Action {
    /// The wire tag for this action
    pub fn tag(&self) -> &str {
        match self {
            Self::SeekAudio { .. } => "seek_audio",
            Self::PlayAudio => "play_audio",
            Self::PauseAudio => "pause_audio",
            Self::StopAudio => "stop_audio",
            Self::ChatMessage { .. } => "chat_message",
            Self::Custom { action, .. } => action,
        }
    }

    /// Build the wire envelope for this action
    pub fn into_message(self) -> OutboundMessage {
        match self {
            Self::SeekAudio { time } => {
                let mut params = Map::new();
                params.insert("time".to_string(), json!(time));
                OutboundMessage {
                    action: "seek_audio".to_string(),
                    params,
                }
            }
            Self::PlayAudio => OutboundMessage {
                action: "play_audio".to_string(),
                params: Map::new(),
            },
            Self::PauseAudio => OutboundMessage {
                action: "pause_audio".to_string(),
                params: Map::new(),
            },
            Self::StopAudio => OutboundMessage {
                action: "stop_audio".to_string(),
                params: Map::new(),
            },
            Self::ChatMessage { text } => {
                let mut params = Map::new();
                params.insert("text".to_string(), json!(text));
                OutboundMessage {
                    action: "chat_message".to_string(),
                    params,
                }
            }
            Self::Custom { action, params } => OutboundMessage { action, params },
        }
    }
}

impl From<Action> for OutboundMessage {
    fn from(action: Action) -> Self {
        action.into_message()
    }
}

// =============================================================================
// Server -> Client Messages
// =============================================================================

/// Events pushed by the authority
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full application state snapshot. The authority sends one
    /// immediately after the connection is established and again after
    /// every state change.
    AppState { data: AppState },

    /// The authority rejected a message or hit an internal failure
    Error {
        #[serde(default)]
        error: Value,
    },
}

/// The authority's view of the running session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppState {
    /// Identifier of the loaded song, if any
    #[serde(default)]
    pub current_song: Option<String>,

    /// Whether the authority considers playback active
    #[serde(default)]
    pub is_playing: bool,

    /// Playback position in seconds
    #[serde(default)]
    pub position: f64,
}

/// Derive a human-readable message from an authority error payload.
///
/// The authority sends either a bare string or an object with an `error`
/// field; anything else is rendered as compact JSON.
pub fn describe_error(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => match fields.get("error").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => error.to_string(),
        },
        Value::Null => "unspecified error".to_string(),
        other => other.to_string(),
    }
}
