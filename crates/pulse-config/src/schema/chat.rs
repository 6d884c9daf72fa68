//! Chat room configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Name to chat and announce under. A `user-xxxxxxxx` name is generated when unset.
    pub username: Option<String>,
    /// Channel chat messages are published on.
    pub channel: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            username: None,
            channel: "messages".to_string(),
        }
    }
}
