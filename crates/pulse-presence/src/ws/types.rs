//! Configuration and command types for the WebSocket transport.

use super::frames::ClientFrame;

/// Configuration for connecting to a relay.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Relay URL, e.g. `ws://127.0.0.1:8080`.
    pub url: String,
    /// Reconnect base delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
    /// Connect attempt timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".to_string(),
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
            connect_timeout_secs: 15,
        }
    }
}

impl WsConfig {
    /// Delay to wait after a failed attempt that waited `current` seconds.
    pub(crate) fn next_delay(&self, current: u64) -> u64 {
        current.saturating_mul(2).min(self.max_reconnect_delay_secs)
    }
}

/// Commands sent from transport handles to the connection task.
#[derive(Debug)]
pub(crate) enum WsCommand {
    Send(ClientFrame),
}
