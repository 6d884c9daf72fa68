//! Relay connection configuration.

use serde::{Deserialize, Serialize};

/// Where and how to reach the pub/sub relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket URL of the relay (`ws://` or `wss://`).
    pub url: String,
    /// Reconnect base delay in seconds (valid range: 1-60).
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
    /// Connect attempt timeout in seconds (valid range: 1-120).
    pub connect_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".to_string(),
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
            connect_timeout_secs: 15,
        }
    }
}
