//! Error types for the session client
//!
//! Failures inside the connection layer never cross the public contract as
//! panics or return values; they are delivered through the error-callback
//! channel registered on the connection manager.

use thiserror::Error;

use crate::media::MediaError;

/// Errors surfaced by the session client
#[derive(Error, Debug)]
pub enum ClientError {
    /// A send was attempted while the transport was not connected.
    /// The message is dropped; recoverable once the connection is back.
    #[error("not connected to the show authority")]
    NotConnected,

    /// The transport gave up reconnecting. Recoverable only through an
    /// explicit user reconnect.
    #[error("gave up reconnecting after {attempts} failed attempts")]
    ReconnectionExhausted { attempts: u32 },

    /// The authority sent an error event
    #[error("authority error: {0}")]
    Authority(String),

    /// The transport failed while forwarding a message
    #[error("transport error: {0}")]
    Transport(String),

    /// Fetching or probing an audio resource failed. Recoverable on the
    /// next song change; media loads are never retried automatically.
    #[error(transparent)]
    MediaLoad(#[from] MediaError),

    /// A registered listener panicked while handling an event
    #[error("listener panicked while handling {context}")]
    CallbackFailure { context: &'static str },

    /// Wire format error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether this error persists until the user explicitly intervenes
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ReconnectionExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(ClientError::ReconnectionExhausted { attempts: 5 }.is_terminal());
        assert!(!ClientError::NotConnected.is_terminal());
        assert!(!ClientError::Authority("bad action".into()).is_terminal());
    }

    #[test]
    fn test_display() {
        let err = ClientError::ReconnectionExhausted { attempts: 3 };
        assert_eq!(err.to_string(), "gave up reconnecting after 3 failed attempts");

        let err = ClientError::NotConnected;
        assert_eq!(err.to_string(), "not connected to the show authority");
    }
}
