//! Presence announcement and liveness settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Presence engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// How often the local participant announces itself and the roster is swept.
    pub announce_interval_ms: u64,
    /// Maximum silence before a participant is declared offline.
    /// Must be greater than `announce_interval_ms`.
    pub stale_threshold_ms: u64,
    /// Channel announcements are published on.
    pub channel: String,
    /// Whether the local participant appears on its own roster.
    pub track_self: bool,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            announce_interval_ms: 5000,
            stale_threshold_ms: 15000,
            channel: "presence".to_string(),
            track_self: true,
        }
    }
}

impl PresenceConfig {
    pub fn announce_interval(&self) -> Duration {
        Duration::from_millis(self.announce_interval_ms)
    }
}
