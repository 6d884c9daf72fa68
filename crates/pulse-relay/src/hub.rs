//! Channel hub: maps channel names to the connections subscribed to them.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use pulse_presence::ws::ServerFrame;

/// Relay-local identifier of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, mpsc::Sender<String>>,
    channels: HashMap<String, HashSet<ConnectionId>>,
}

/// Thread-safe channel registry shared by all connection tasks.
#[derive(Clone, Default)]
pub struct ChannelHub {
    state: Arc<RwLock<HubState>>,
    next_id: Arc<AtomicU64>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound queue.
    pub async fn register(&self, tx: mpsc::Sender<String>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.state.write().await.connections.insert(id, tx);
        id
    }

    /// Returns true if the connection was not yet subscribed.
    pub async fn subscribe(&self, conn: ConnectionId, channel: &str) -> bool {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(&conn) {
            return false;
        }
        state
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(conn)
    }

    /// Returns true if the connection was subscribed.
    pub async fn unsubscribe(&self, conn: ConnectionId, channel: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(members) = state.channels.get_mut(channel) else {
            return false;
        };
        let removed = members.remove(&conn);
        if members.is_empty() {
            state.channels.remove(channel);
        }
        removed
    }

    /// Deliver `payload` to every subscriber of `channel`, the publisher
    /// included. Returns the number of connections it was queued for.
    ///
    /// A subscriber whose queue is full misses this message.
    pub async fn publish(&self, channel: &str, payload: serde_json::Value) -> usize {
        let frame = ServerFrame::Message {
            channel: channel.to_string(),
            payload,
        };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(channel, error = %e, "Failed to encode message frame");
                return 0;
            }
        };

        let state = self.state.read().await;
        let Some(members) = state.channels.get(channel) else {
            return 0;
        };

        let mut delivered = 0;
        for conn in members {
            let Some(tx) = state.connections.get(conn) else {
                continue;
            };
            match tx.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(%conn, channel, "Outbound queue full, dropping message");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(%conn, channel, "Connection queue closed");
                }
            }
        }
        delivered
    }

    /// Forget a connection and all of its subscriptions.
    pub async fn remove_connection(&self, conn: ConnectionId) {
        let mut state = self.state.write().await;
        state.connections.remove(&conn);
        state.channels.retain(|_, members| {
            members.remove(&conn);
            !members.is_empty()
        });
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Number of channels with at least one subscriber.
    pub async fn channel_count(&self) -> usize {
        self.state.read().await.channels.len()
    }

    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.state
            .read()
            .await
            .channels
            .get(channel)
            .map_or(0, HashSet::len)
    }
}
