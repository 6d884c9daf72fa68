//! Per-connection handler: register, then serve subscribe/publish frames.

use std::net::SocketAddr;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use pulse_presence::ws::{ClientFrame, ServerFrame};

use crate::hub::{ChannelHub, ConnectionId};

const OUTBOUND_CAPACITY: usize = 256;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Handle a single WebSocket connection until it closes.
pub async fn handle_connection(ws: WebSocketStream<TcpStream>, addr: SocketAddr, hub: ChannelHub) {
    let (mut sink, mut stream) = ws.split();

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let conn = hub.register(tx).await;

    tracing::info!(peer = %addr, %conn, "Client connected");

    loop {
        tokio::select! {
            Some(msg) = rx.recv() => {
                if sink.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => handle_frame(&hub, conn, frame).await,
                            Err(e) => {
                                tracing::warn!(peer = %addr, error = %e, "Invalid client frame");
                                let reply = ServerFrame::Error {
                                    message: format!("invalid frame: {e}"),
                                };
                                if send_frame(&mut sink, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let reply = ServerFrame::Error {
                            message: "binary frames are not supported".into(),
                        };
                        if send_frame(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!(peer = %addr, %conn, "Client disconnected");
    hub.remove_connection(conn).await;
}

async fn handle_frame(hub: &ChannelHub, conn: ConnectionId, frame: ClientFrame) {
    match frame {
        ClientFrame::Subscribe { channel } => {
            if hub.subscribe(conn, &channel).await {
                tracing::debug!(%conn, channel, "Subscribed");
            }
        }
        ClientFrame::Unsubscribe { channel } => {
            if hub.unsubscribe(conn, &channel).await {
                tracing::debug!(%conn, channel, "Unsubscribed");
            }
        }
        ClientFrame::Publish { channel, payload } => {
            let delivered = hub.publish(&channel, payload).await;
            tracing::trace!(%conn, channel, delivered, "Published");
        }
    }
}

/// Send a ServerFrame as a JSON text frame.
async fn send_frame(
    sink: &mut WsSink,
    frame: &ServerFrame,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode server frame");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await
}
