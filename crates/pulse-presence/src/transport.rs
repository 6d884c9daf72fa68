//! The pub/sub seam the presence engine and chat client are written against.

use std::fmt;

use tokio::sync::{broadcast, mpsc, watch};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("outbound queue is full")]
    QueueFull,

    #[error("transport is shut down")]
    Closed,

    #[error("failed to encode payload: {0}")]
    Encode(String),
}

/// Something observers should hear about that is not a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportNotice {
    /// A connection attempt failed; a retry follows.
    ConnectFailed(String),
    /// The relay rejected something we sent.
    RelayError(String),
    /// The relay was asked to deliver this channel to us.
    Subscribed(String),
}

impl fmt::Display for TransportNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed(reason) => write!(f, "failed to connect: {reason}"),
            Self::RelayError(message) => write!(f, "relay error: {message}"),
            Self::Subscribed(channel) => write!(f, "subscribed to {channel}"),
        }
    }
}

/// A publish/subscribe connection shared by everything in one client.
///
/// `publish` is fire-and-forget: it must never block, and an `Ok` only means
/// the payload was handed to the transport, not that anyone received it.
pub trait ChannelTransport: Send + Sync + 'static {
    fn publish(&self, channel: &str, payload: serde_json::Value) -> Result<(), TransportError>;

    /// Receive every payload subsequently published on `channel`.
    ///
    /// Dropping the receiver ends the subscription.
    fn subscribe(&self, channel: &str) -> mpsc::Receiver<serde_json::Value>;

    fn is_connected(&self) -> bool;

    /// Watch connection state changes.
    fn watch_connection(&self) -> watch::Receiver<bool>;

    /// Notices raised after this call. A slow reader may lag and miss some.
    fn notices(&self) -> broadcast::Receiver<TransportNotice>;
}
