//! Background WebSocket connection loop with auto-reconnect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::transport::TransportNotice;

use super::frames::{ClientFrame, ServerFrame};
use super::types::{WsCommand, WsConfig};

/// Local receivers per relay channel, shared with the transport handles.
pub(crate) type Subscribers = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<serde_json::Value>>>>>;

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Lost,
    Shutdown,
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task managing the relay connection until cancelled.
pub(crate) async fn connection_loop(
    config: WsConfig,
    subscribers: Subscribers,
    connected: watch::Sender<bool>,
    notices: broadcast::Sender<TransportNotice>,
    mut command_rx: mpsc::Receiver<WsCommand>,
    cancel: CancellationToken,
) {
    let mut reconnect_delay = config.reconnect_delay_secs;
    // Control frames left over from a lost session.
    let mut carried: Vec<ClientFrame> = Vec::new();

    loop {
        info!(url = %config.url, "Connecting to relay");

        let attempt = tokio::time::timeout(
            Duration::from_secs(config.connect_timeout_secs),
            tokio_tungstenite::connect_async(config.url.as_str()),
        );
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = attempt => result,
        };

        match result {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = config.reconnect_delay_secs;
                let (mut ws_write, mut ws_read) = ws_stream.split();

                // Resubscribe everything local receivers still listen on.
                let channels: Vec<String> = subscribers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .keys()
                    .cloned()
                    .collect();
                let mut resubscribed = true;
                for channel in &channels {
                    let frame = ClientFrame::Subscribe {
                        channel: channel.clone(),
                    };
                    if !send_noted(&mut ws_write, &frame, &notices).await {
                        resubscribed = false;
                        break;
                    }
                }
                if resubscribed {
                    for frame in carried.drain(..) {
                        if matches!(&frame, ClientFrame::Subscribe { channel } if channels.contains(channel))
                        {
                            continue;
                        }
                        if !send_noted(&mut ws_write, &frame, &notices).await {
                            resubscribed = false;
                            break;
                        }
                    }
                }

                if resubscribed {
                    connected.send_replace(true);
                    info!("Connected to relay");

                    let end = run_session(
                        &mut ws_write,
                        &mut ws_read,
                        &subscribers,
                        &notices,
                        &mut command_rx,
                        &cancel,
                    )
                    .await;

                    connected.send_replace(false);
                    if end == SessionEnd::Shutdown {
                        let _ = ws_write.send(WsMessage::Close(None)).await;
                        break;
                    }
                    info!("Relay connection lost");
                    carried = drain_stale(&mut command_rx);
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to relay");
                let _ = notices.send(TransportNotice::ConnectFailed(e.to_string()));
            }
            Err(_elapsed) => {
                error!(
                    timeout_secs = config.connect_timeout_secs,
                    "Relay connection attempt timed out"
                );
                let _ = notices.send(TransportNotice::ConnectFailed(format!(
                    "timed out after {}s",
                    config.connect_timeout_secs
                )));
            }
        }

        // Exponential backoff reconnect.
        info!(delay = reconnect_delay, "Reconnecting in {} seconds", reconnect_delay);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(reconnect_delay)) => {}
        }
        reconnect_delay = config.next_delay(reconnect_delay);
    }

    connected.send_replace(false);
    info!("Relay transport shut down");
}

/// Discard publishes queued for a session that is gone; they must not be
/// replayed on the next one. Subscribe and unsubscribe frames are kept.
fn drain_stale(command_rx: &mut mpsc::Receiver<WsCommand>) -> Vec<ClientFrame> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    while let Ok(WsCommand::Send(frame)) = command_rx.try_recv() {
        match frame {
            ClientFrame::Publish { .. } => dropped += 1,
            control => kept.push(control),
        }
    }
    if dropped > 0 {
        debug!(dropped, "Discarded publishes queued for the lost session");
    }
    kept
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

async fn run_session<S, R>(
    ws_write: &mut S,
    ws_read: &mut R,
    subscribers: &Subscribers,
    notices: &broadcast::Sender<TransportNotice>,
    command_rx: &mut mpsc::Receiver<WsCommand>,
    cancel: &CancellationToken,
) -> SessionEnd
where
    S: Sink<WsMessage> + Unpin,
    R: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Shutdown,

            cmd = command_rx.recv() => match cmd {
                Some(WsCommand::Send(frame)) => {
                    if !send_noted(ws_write, &frame, notices).await {
                        return SessionEnd::Lost;
                    }
                }
                None => return SessionEnd::Shutdown,
            },

            msg = ws_read.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(ServerFrame::Message { channel, payload }) => {
                            if dispatch(subscribers, &channel, payload) {
                                debug!(channel = %channel, "No local receivers left, unsubscribing");
                                let frame = ClientFrame::Unsubscribe { channel };
                                if !send_frame(ws_write, &frame).await {
                                    return SessionEnd::Lost;
                                }
                            }
                        }
                        Ok(ServerFrame::Error { message }) => {
                            warn!(message = %message, "Relay reported an error");
                            let _ = notices.send(TransportNotice::RelayError(message));
                        }
                        Err(e) => {
                            debug!(error = %e, text = %text, "Unrecognized frame from relay");
                        }
                    }
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    let _ = ws_write.send(WsMessage::Pong(data)).await;
                }
                Some(Ok(WsMessage::Close(_))) | None => return SessionEnd::Lost,
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return SessionEnd::Lost;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Send `frame`, reporting subscriptions once they are on the wire.
async fn send_noted<S>(
    ws_write: &mut S,
    frame: &ClientFrame,
    notices: &broadcast::Sender<TransportNotice>,
) -> bool
where
    S: Sink<WsMessage> + Unpin,
{
    if !send_frame(ws_write, frame).await {
        return false;
    }
    if let ClientFrame::Subscribe { channel } = frame {
        debug!(channel = %channel, "Subscribed");
        let _ = notices.send(TransportNotice::Subscribed(channel.clone()));
    }
    true
}

async fn send_frame<S>(ws_write: &mut S, frame: &ClientFrame) -> bool
where
    S: Sink<WsMessage> + Unpin,
{
    match serde_json::to_string(frame) {
        Ok(json) => ws_write.send(WsMessage::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to encode frame");
            true
        }
    }
}

/// Hand `payload` to every local receiver of `channel`.
///
/// Returns true when the last receiver of the channel has gone away.
pub(crate) fn dispatch(subscribers: &Subscribers, channel: &str, payload: serde_json::Value) -> bool {
    let mut subs = subscribers.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(list) = subs.get_mut(channel) else {
        debug!(channel = %channel, "Message for channel without receivers");
        return false;
    };
    list.retain(|tx| match tx.try_send(payload.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(channel = %channel, "Receiver queue full, dropping message");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
    if list.is_empty() {
        subs.remove(channel);
        return true;
    }
    false
}
