//! pulse-relay: a small WebSocket publish/subscribe relay.
//!
//! Clients subscribe to named channels and publish JSON payloads; every
//! payload is fanned out to all current subscribers of its channel,
//! including the publisher. The relay never inspects payloads.

pub mod connection;
pub mod hub;

use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

pub use hub::{ChannelHub, ConnectionId};

/// Accept connections on `listener` forever, one task per client.
pub async fn serve(listener: TcpListener, hub: ChannelHub) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let hub = hub.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => connection::handle_connection(ws, addr, hub).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
