//! Session synchronization client for the Showlink show authority
//!
//! This crate keeps a local user interface in agreement with the remote
//! "now playing" session over a persistent websocket, and mirrors local
//! playback actions back to the authority:
//!
//! - [`ConnectionManager`] owns the transport, its retry policy, and the
//!   event fan-out to listeners.
//! - [`SessionStore`] turns inbound events into the latest known
//!   [`SessionState`] snapshot.
//! - [`PlaybackReconciler`] corrects a local [`MediaSurface`] against the
//!   remote state without creating feedback loops.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use showlink_client::{ConnectionManager, ReconnectPolicy, SessionStore};
//!
//! # async fn example() {
//! let url = url::Url::parse("ws://localhost:5000/ws").unwrap();
//! let manager = ConnectionManager::new(url, ReconnectPolicy::default());
//! let store = SessionStore::new(manager.clone(), Duration::from_secs(1));
//!
//! manager.connect();
//! println!("song: {:?}", store.snapshot().current_song);
//! # }
//! ```

mod connection;
mod error;
mod media;
mod messages;
mod reconciler;
mod session;
mod transport;

pub use connection::{ConnectionManager, ConnectionState};
pub use error::ClientError;
pub use media::{LoadedMedia, MediaError, MediaLoader, MediaSession, MediaSurface};
pub use messages::{describe_error, Action, AppState, OutboundMessage, ServerEvent};
pub use reconciler::{run_sync_loop, OutboundSink, PlaybackReconciler};
pub use session::{SessionState, SessionStore};
pub use transport::{
    DisconnectReason, ReconnectPolicy, TransportEvent, TransportFactory, TransportHandle,
    WsTransportFactory,
};
