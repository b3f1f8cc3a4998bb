//! Scripted transport for connection-layer tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

use showlink_client::{
    OutboundMessage, ReconnectPolicy, TransportEvent, TransportFactory, TransportHandle,
};

/// A transport factory whose sessions are driven entirely by the test.
///
/// Events queued with [`ScriptedTransport::script`] are delivered as soon
/// as a session is spawned; later events are injected live with
/// [`ScriptedTransport::emit`]. Everything the client sends is recorded.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<ScriptedInner>,
}

#[derive(Default)]
struct ScriptedInner {
    initial: Mutex<Vec<TransportEvent>>,
    live: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    sent: Mutex<Vec<OutboundMessage>>,
    spawns: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue events to be delivered when the next session spawns
    pub fn script(&self, events: impl IntoIterator<Item = TransportEvent>) {
        self.inner.initial.lock().extend(events);
    }

    /// Inject an event into the currently spawned session.
    ///
    /// Returns false if no session is active or the session's event
    /// channel is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        match self.inner.live.lock().as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Messages the client has sent so far
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.inner.sent.lock().clone()
    }

    /// How many sessions have been spawned
    pub fn spawn_count(&self) -> usize {
        self.inner.spawns.load(Ordering::SeqCst)
    }
}

impl TransportFactory for ScriptedTransport {
    fn spawn(
        &self,
        _url: &Url,
        _policy: &ReconnectPolicy,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> TransportHandle {
        self.inner.spawns.fetch_add(1, Ordering::SeqCst);

        for event in self.inner.initial.lock().drain(..) {
            let _ = events.send(event);
        }
        *self.inner.live.lock() = Some(events);

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let sent = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                sent.sent.lock().push(message);
            }
        });

        TransportHandle::new(outbound_tx, task)
    }
}
