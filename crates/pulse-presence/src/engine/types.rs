//! Engine configuration and errors.

use std::time::Duration;

/// Settings fixed for the lifetime of one engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of self-announcements and roster sweeps.
    pub announce_interval: Duration,
    /// Silence after which a participant is declared gone.
    pub stale_threshold_ms: u64,
    /// Channel announcements are exchanged on.
    pub channel: String,
    /// Whether the local participant's own announcements put it on the roster.
    pub track_self: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            announce_interval: Duration::from_millis(5000),
            stale_threshold_ms: 15000,
            channel: "presence".to_string(),
            track_self: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.announce_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "announce interval must be non-zero".into(),
            ));
        }
        if u128::from(self.stale_threshold_ms) <= self.announce_interval.as_millis() {
            return Err(EngineError::InvalidConfig(format!(
                "stale threshold {}ms must exceed announce interval {}ms",
                self.stale_threshold_ms,
                self.announce_interval.as_millis()
            )));
        }
        if self.channel.is_empty() {
            return Err(EngineError::InvalidConfig("channel must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("presence engine is already running")]
    AlreadyRunning,

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}
