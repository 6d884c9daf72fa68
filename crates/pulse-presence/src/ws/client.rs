//! Public handle for the relay connection.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::transport::{ChannelTransport, TransportError, TransportNotice};

use super::connection::{connection_loop, Subscribers};
use super::frames::ClientFrame;
use super::types::{WsCommand, WsConfig};

const RECEIVER_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 256;
const NOTICE_CAPACITY: usize = 64;

/// [`ChannelTransport`] backed by a relay WebSocket connection.
///
/// All methods are non-blocking and hand work to the background
/// connection task. Dropping the transport shuts the connection down.
pub struct WsTransport {
    command_tx: mpsc::Sender<WsCommand>,
    subscribers: Subscribers,
    connected: watch::Receiver<bool>,
    notices: broadcast::Sender<TransportNotice>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Start the background connection. Must be called inside a tokio runtime.
    pub fn connect(config: WsConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (connected_tx, connected_rx) = watch::channel(false);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let subscribers: Subscribers = Arc::default();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(connection_loop(
            config,
            Arc::clone(&subscribers),
            connected_tx,
            notices.clone(),
            command_rx,
            cancel.clone(),
        ));

        Self {
            command_tx,
            subscribers,
            connected: connected_rx,
            notices,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Close the connection and wait for the background task to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn send(&self, frame: ClientFrame) -> Result<(), TransportError> {
        self.command_tx
            .try_send(WsCommand::Send(frame))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
            })
    }
}

impl ChannelTransport for WsTransport {
    fn publish(&self, channel: &str, payload: serde_json::Value) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.send(ClientFrame::Publish {
            channel: channel.to_string(),
            payload,
        })
    }

    fn subscribe(&self, channel: &str) -> mpsc::Receiver<serde_json::Value> {
        let (tx, rx) = mpsc::channel(RECEIVER_CAPACITY);
        let first = {
            let mut subs = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let list = subs.entry(channel.to_string()).or_default();
            list.push(tx);
            list.len() == 1
        };
        // Queued even while offline; a repeated subscribe is a no-op at the relay.
        if first {
            if let Err(e) = self.send(ClientFrame::Subscribe {
                channel: channel.to_string(),
            }) {
                warn!(channel = %channel, error = %e, "Failed to queue subscribe");
            }
        }
        rx
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn watch_connection(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    fn notices(&self) -> broadcast::Receiver<TransportNotice> {
        self.notices.subscribe()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
