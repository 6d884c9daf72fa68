//! WebSocket transport for a `pulse-relay` server.
//!
//! Handles reconnect with backoff, resubscription after reconnect and
//! per-channel fan-out of inbound messages. The relay speaks the JSON
//! frames in [`frames`].

mod client;
mod connection;
pub mod frames;
mod types;

pub use client::WsTransport;
pub use frames::{ClientFrame, ServerFrame};
pub use types::WsConfig;
