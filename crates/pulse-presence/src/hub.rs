//! In-process pub/sub bus.
//!
//! Every subscriber of a channel, including the publisher's own
//! subscriptions, receives each payload published on it. Used for
//! offline mode and tests; connection loss can be simulated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

use crate::transport::{ChannelTransport, TransportError, TransportNotice};

const CHANNEL_CAPACITY: usize = 256;
const NOTICE_CAPACITY: usize = 64;

type Subscribers = HashMap<String, Vec<mpsc::Sender<serde_json::Value>>>;

/// Cloneable handle to a shared in-memory bus.
#[derive(Clone)]
pub struct LocalHub {
    subscribers: Arc<Mutex<Subscribers>>,
    connected: Arc<watch::Sender<bool>>,
    notices: broadcast::Sender<TransportNotice>,
}

impl LocalHub {
    /// A connected, empty hub.
    pub fn new() -> Self {
        let (connected, _) = watch::channel(true);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(connected),
            notices,
        }
    }

    /// Simulate losing or regaining the connection.
    pub fn set_connected(&self, connected: bool) {
        self.connected.send_replace(connected);
    }

    /// Raise a notice as a relay would. Returns false if nobody is listening.
    pub fn notify(&self, notice: TransportNotice) -> bool {
        self.notices.send(notice).is_ok()
    }

    /// Live subscriptions on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subs.get(channel)
            .map(|list| list.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport for LocalHub {
    fn publish(&self, channel: &str, payload: serde_json::Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let mut subs = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = subs.get_mut(channel) {
            list.retain(|tx| match tx.try_send(payload.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(channel = %channel, "Subscriber queue full, dropping payload");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
            if list.is_empty() {
                subs.remove(channel);
            }
        } else {
            debug!(channel = %channel, "Published to channel with no subscribers");
        }
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> mpsc::Receiver<serde_json::Value> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        rx
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn watch_connection(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    fn notices(&self) -> broadcast::Receiver<TransportNotice> {
        self.notices.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_reaches_all_subscribers_of_the_channel() {
        let hub = LocalHub::new();
        let mut a = hub.subscribe("presence");
        let mut b = hub.subscribe("presence");
        let mut other = hub.subscribe("messages");

        hub.publish("presence", json!({ "user": "alice" })).unwrap();

        assert_eq!(a.try_recv().unwrap(), json!({ "user": "alice" }));
        assert_eq!(b.try_recv().unwrap(), json!({ "user": "alice" }));
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn publish_while_disconnected_fails() {
        let hub = LocalHub::new();
        let mut rx = hub.subscribe("presence");
        hub.set_connected(false);

        let err = hub.publish("presence", json!({ "user": "alice" })).unwrap_err();
        assert_eq!(err, TransportError::NotConnected);
        assert!(rx.try_recv().is_err());

        hub.set_connected(true);
        assert!(hub.publish("presence", json!({ "user": "alice" })).is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn dropped_receivers_are_pruned_on_publish() {
        let hub = LocalHub::new();
        let rx = hub.subscribe("presence");
        assert_eq!(hub.subscriber_count("presence"), 1);
        drop(rx);
        assert_eq!(hub.subscriber_count("presence"), 0);

        hub.publish("presence", json!({})).unwrap();
        assert_eq!(hub.subscriber_count("presence"), 0);
    }

    #[tokio::test]
    async fn connection_changes_are_observable() {
        let hub = LocalHub::new();
        let mut watch = hub.watch_connection();
        assert!(*watch.borrow());

        hub.set_connected(false);
        watch.changed().await.unwrap();
        assert!(!*watch.borrow());
        assert!(!hub.is_connected());
    }

    #[test]
    fn notices_reach_every_listener() {
        let hub = LocalHub::new();
        assert!(!hub.notify(TransportNotice::RelayError("nobody hears this".into())));

        let mut a = hub.notices();
        let mut b = hub.clone().notices();
        assert!(hub.notify(TransportNotice::Subscribed("presence".into())));
        assert_eq!(a.try_recv().unwrap(), TransportNotice::Subscribed("presence".into()));
        assert_eq!(b.try_recv().unwrap(), TransportNotice::Subscribed("presence".into()));
    }
}
