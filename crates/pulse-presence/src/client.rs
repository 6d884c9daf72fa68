//! Chat client: presence engine plus the chat channel and connection status.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pulse_common::ParticipantId;

use crate::engine::{EngineConfig, EngineError, PresenceEngine};
use crate::protocol::ChatPayload;
use crate::sink::{PresenceEvent, SinkId, SinkRegistry, Subscription};
use crate::transport::{ChannelTransport, TransportError, TransportNotice};

/// Channel layout and presence timing for a [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub presence: EngineConfig,
    /// Channel chat lines are exchanged on.
    pub chat_channel: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            presence: EngineConfig::default(),
            chat_channel: "messages".to_string(),
        }
    }
}

struct Forwarder {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// One participant's view of the chat: who is online, what they say, and
/// whether the transport is up. All of it arrives as [`PresenceEvent`]s on
/// subscriptions from [`ChatClient::subscribe`].
pub struct ChatClient {
    identity: ParticipantId,
    settings: ChatSettings,
    transport: Arc<dyn ChannelTransport>,
    sinks: Arc<SinkRegistry>,
    engine: PresenceEngine,
    forwarder: Option<Forwarder>,
}

impl ChatClient {
    pub fn new(
        identity: ParticipantId,
        settings: ChatSettings,
        transport: Arc<dyn ChannelTransport>,
    ) -> Self {
        let sinks = Arc::new(SinkRegistry::new());
        let engine = PresenceEngine::new(Arc::clone(&transport), Arc::clone(&sinks));
        Self {
            identity,
            settings,
            transport,
            sinks,
            engine,
            forwarder: None,
        }
    }

    pub fn identity(&self) -> &ParticipantId {
        &self.identity
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Start presence tracking and chat forwarding. Must be called inside a
    /// tokio runtime.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.forwarder.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        if self.settings.chat_channel == self.settings.presence.channel {
            return Err(EngineError::InvalidConfig(
                "chat and presence channels must differ".into(),
            ));
        }
        self.engine
            .start(self.identity.clone(), self.settings.presence.clone())?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(forward(
            self.transport.subscribe(&self.settings.chat_channel),
            self.transport.watch_connection(),
            self.transport.notices(),
            Arc::clone(&self.sinks),
            cancel.clone(),
        ));
        self.forwarder = Some(Forwarder { cancel, handle });

        info!(identity = %self.identity, "Chat client started");
        Ok(())
    }

    /// Stop everything. No event is emitted after this returns.
    pub async fn stop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.cancel.cancel();
            let _ = forwarder.handle.await;
        }
        self.engine.stop().await;
    }

    /// Publish a chat line as the local participant.
    pub fn send_chat(&self, text: &str) -> Result<(), TransportError> {
        let payload = ChatPayload::new(self.identity.clone(), text)
            .encode()
            .map_err(|e| TransportError::Encode(e.to_string()))?;
        self.transport.publish(&self.settings.chat_channel, payload)
    }

    /// Register an observer. Its stream starts with the current connection state.
    pub fn subscribe(&self) -> Subscription {
        self.sinks.subscribe_with(vec![PresenceEvent::ConnectionState {
            connected: self.transport.is_connected(),
        }])
    }

    pub fn unsubscribe(&self, id: SinkId) -> bool {
        self.sinks.unsubscribe(id)
    }

    /// Participants currently believed online.
    pub async fn online(&self) -> Vec<ParticipantId> {
        self.engine.roster().await
    }
}

/// Turn chat payloads, connection changes and transport notices into events
/// until cancelled.
async fn forward(
    mut chat_rx: mpsc::Receiver<serde_json::Value>,
    mut connection: watch::Receiver<bool>,
    mut notices: broadcast::Receiver<TransportNotice>,
    sinks: Arc<SinkRegistry>,
    cancel: CancellationToken,
) {
    let mut chat_open = true;
    let mut watch_open = true;
    let mut notices_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            payload = chat_rx.recv(), if chat_open => match payload {
                Some(payload) => match ChatPayload::decode(&payload) {
                    Ok(msg) => {
                        debug!(user = %msg.user, chars = msg.text.len(), "Chat message received");
                        sinks.emit(PresenceEvent::ChatMessage {
                            user: msg.user,
                            text: msg.text,
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, payload = %payload, "Received malformed chat message");
                    }
                },
                None => {
                    warn!("Chat subscription closed");
                    chat_open = false;
                }
            },

            changed = connection.changed(), if watch_open => match changed {
                Ok(()) => {
                    let connected = *connection.borrow_and_update();
                    info!(connected, "Transport connection changed");
                    sinks.emit(PresenceEvent::ConnectionState { connected });
                    let message = if connected { "connected" } else { "disconnected" };
                    sinks.emit(PresenceEvent::Info {
                        message: message.to_string(),
                    });
                }
                Err(_) => watch_open = false,
            },

            notice = notices.recv(), if notices_open => match notice {
                Ok(notice) => {
                    sinks.emit(PresenceEvent::Info {
                        message: notice.to_string(),
                    });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Transport notices lagged");
                }
                Err(broadcast::error::RecvError::Closed) => notices_open = false,
            },
        }
    }
}
