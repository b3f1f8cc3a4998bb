//! Websocket transport with a built-in retry loop
//!
//! A transport session is one background task owning the socket. It keeps
//! trying to (re)connect until it either exhausts its attempt budget or is
//! shut down, and reports everything that happens through an event channel.
//! The connection manager never touches the socket directly; it only holds
//! a [`TransportHandle`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::ClientError;
use crate::messages::{OutboundMessage, ServerEvent};

/// Why a transport session stopped being connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The authority closed the connection
    ServerClosed,

    /// The connection dropped without a close handshake
    ConnectionLost,

    /// The client asked for the teardown
    Requested,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerClosed => write!(f, "server closed"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::Requested => write!(f, "requested"),
        }
    }
}

/// Lifecycle and protocol events reported by a transport session.
///
/// Events are delivered in the order they occur on the socket; the channel
/// introduces no reordering or batching.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Handshake completed
    Connected,

    /// An established connection ended
    Disconnected {
        reason: DisconnectReason,
        detail: Option<String>,
    },

    /// A connection attempt failed before the handshake completed
    ConnectError { detail: String },

    /// A protocol event arrived from the authority
    Event(ServerEvent),
}

/// Retry parameters for a transport session.
///
/// The transport's own loop drives the timing; the connection manager only
/// counts failures against `max_attempts`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before the session gives up
    pub max_attempts: u32,

    /// Fixed delay between attempts
    pub base_delay: Duration,

    /// How long a single handshake may take
    pub handshake_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Handle for one transport session.
///
/// Dropping or shutting down the handle is the only way to stop the
/// session; a fresh `connect()` always creates a fresh handle.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Wrap an outbound channel and the session task driving it
    pub fn new(outbound: mpsc::UnboundedSender<OutboundMessage>, task: JoinHandle<()>) -> Self {
        Self { outbound, task }
    }

    /// Queue a message for transmission
    pub fn send(&self, message: OutboundMessage) -> Result<(), ClientError> {
        self.outbound
            .send(message)
            .map_err(|_| ClientError::Transport("transport session has ended".to_string()))
    }

    /// Stop the session, cancelling any in-flight reconnection attempt
    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Something that can spawn transport sessions.
///
/// Production code uses [`WsTransportFactory`]; tests substitute a scripted
/// implementation.
pub trait TransportFactory: Send + Sync {
    /// Spawn a session task that reports through `events`
    fn spawn(
        &self,
        url: &Url,
        policy: &ReconnectPolicy,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> TransportHandle;
}

/// The production websocket transport
#[derive(Debug, Default)]
pub struct WsTransportFactory;

impl TransportFactory for WsTransportFactory {
    fn spawn(
        &self,
        url: &Url,
        policy: &ReconnectPolicy,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> TransportHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let url = url.clone();
        let policy = policy.clone();
        let task = tokio::spawn(run_session(url, policy, events, outbound_rx));
        TransportHandle::new(outbound_tx, task)
    }
}

/// Connect-and-retry loop for one session
async fn run_session(
    url: Url,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
) {
    let mut failed_attempts: u32 = 0;

    loop {
        let attempt = tokio::time::timeout(
            policy.handshake_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await;

        match attempt {
            Ok(Ok((stream, _response))) => {
                failed_attempts = 0;
                if events.send(TransportEvent::Connected).is_err() {
                    return;
                }

                let (reason, detail) = drive_socket(stream, &events, &mut outbound_rx).await;
                let requested = reason == DisconnectReason::Requested;
                if events
                    .send(TransportEvent::Disconnected { reason, detail })
                    .is_err()
                    || requested
                {
                    return;
                }
            }
            Ok(Err(e)) => {
                failed_attempts += 1;
                tracing::warn!(
                    attempt = failed_attempts,
                    error = %e,
                    "connection attempt failed"
                );
                if events
                    .send(TransportEvent::ConnectError {
                        detail: e.to_string(),
                    })
                    .is_err()
                {
                    return;
                }
            }
            Err(_elapsed) => {
                failed_attempts += 1;
                tracing::warn!(
                    attempt = failed_attempts,
                    timeout_ms = policy.handshake_timeout.as_millis() as u64,
                    "handshake timed out"
                );
                if events
                    .send(TransportEvent::ConnectError {
                        detail: format!(
                            "handshake timed out after {}ms",
                            policy.handshake_timeout.as_millis()
                        ),
                    })
                    .is_err()
                {
                    return;
                }
            }
        }

        if failed_attempts >= policy.max_attempts {
            tracing::error!(
                attempts = failed_attempts,
                "giving up on transport session"
            );
            return;
        }

        tokio::time::sleep(policy.base_delay).await;
    }
}

/// Pump one established socket until it ends, forwarding frames both ways
async fn drive_socket(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    events: &mpsc::UnboundedSender<TransportEvent>,
    outbound_rx: &mut mpsc::UnboundedReceiver<OutboundMessage>,
) -> (DisconnectReason, Option<String>) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => match outgoing {
                Some(message) => {
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(action = %message.action, error = %e, "failed to serialize outbound message");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        return (DisconnectReason::ConnectionLost, Some("send failed".to_string()));
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return (DisconnectReason::Requested, None);
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => {
                            if events.send(TransportEvent::Event(event)).is_err() {
                                return (DisconnectReason::Requested, None);
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "ignoring unparseable frame");
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let detail = frame.map(|f| f.reason.to_string());
                    return (DisconnectReason::ServerClosed, detail);
                }
                // Pings are answered by tungstenite itself; binary frames
                // are not part of this protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => return (DisconnectReason::ConnectionLost, Some(e.to_string())),
                None => return (DisconnectReason::ConnectionLost, None),
            }
        }
    }
}
