//! Observer registry: fan-out of derived events to registered subscribers.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pulse_common::ParticipantId;

/// Per-subscriber buffer. A subscriber this far behind starts losing events.
const SUBSCRIBER_CAPACITY: usize = 256;

/// Events delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    Joined { identity: ParticipantId },
    Left { identity: ParticipantId },
    ChatMessage { user: ParticipantId, text: String },
    ConnectionState { connected: bool },
    Info { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

/// A registered observer's end of the event stream.
#[derive(Debug)]
pub struct Subscription {
    id: SinkId,
    rx: mpsc::Receiver<PresenceEvent>,
}

impl Subscription {
    pub fn id(&self) -> SinkId {
        self.id
    }

    /// Next event, or `None` once the subscription has been removed.
    pub async fn recv(&mut self) -> Option<PresenceEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PresenceEvent> {
        self.rx.try_recv().ok()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    sinks: Vec<(SinkId, mpsc::Sender<PresenceEvent>)>,
}

/// Registered observers. Events go only to sinks registered at emit time.
#[derive(Default)]
pub struct SinkRegistry {
    inner: Mutex<Registry>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        self.subscribe_with(Vec::new())
    }

    /// Register an observer whose stream starts with `initial`.
    pub fn subscribe_with(&self, initial: Vec<PresenceEvent>) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        for event in initial {
            let _ = tx.try_send(event);
        }
        let mut reg = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = SinkId(reg.next_id);
        reg.next_id += 1;
        reg.sinks.push((id, tx));
        debug!(sink = id.0, observers = reg.sinks.len(), "Observer registered");
        Subscription { id, rx }
    }

    /// Deregister an observer. Returns false if it was not registered.
    ///
    /// Its stream ends once buffered events are drained.
    pub fn unsubscribe(&self, id: SinkId) -> bool {
        let mut reg = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = reg.sinks.len();
        reg.sinks.retain(|(sid, _)| *sid != id);
        before != reg.sinks.len()
    }

    /// Deliver `event` to every registered observer without blocking.
    ///
    /// Observers that dropped their subscription are removed. Returns the
    /// number of observers that accepted the event.
    pub fn emit(&self, event: PresenceEvent) -> usize {
        let mut reg = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        reg.sinks.retain(|(id, tx)| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(sink = id.0, "Observer is not keeping up, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(sink = id.0, "Observer gone, removing");
                false
            }
        });
        delivered
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sinks
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
