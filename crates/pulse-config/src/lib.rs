//! Pulse configuration system.
//!
//! Provides TOML-based configuration with validation. All config sections
//! use sensible defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pulse_config::{load_config_from, config_to_json};
//!
//! let config = load_config_from(None).expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    ChatConfig, LogLevel, LoggingConfig, PresenceConfig, PulseConfig, RelayConfig,
    CONFIG_SCHEMA_VERSION,
};

use std::path::Path;

use pulse_common::ConfigError;

/// Load config from an explicit path, or the platform default when `None`.
///
/// The default is `config.toml` in the OS config directory, created from a
/// commented template if it does not exist yet.
///
/// Unlike [`toml_loader::load_from_path`], an invalid config is an error
/// here: callers get a config they can start an engine with.
pub fn load_config_from(path: Option<&Path>) -> Result<PulseConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            toml_loader::load_from_path(path)?
        }
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &PulseConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
