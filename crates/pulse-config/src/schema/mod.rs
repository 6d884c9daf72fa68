//! Configuration schema types for Pulse.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod chat;
mod presence;
mod relay;
mod system;

pub use chat::*;
pub use presence::*;
pub use relay::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Pulse.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub presence: PresenceConfig,
    pub chat: ChatConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}
