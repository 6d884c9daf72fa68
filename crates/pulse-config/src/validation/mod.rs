//! Full configuration validation.
//!
//! Each check pushes onto a shared error list; the orchestrator joins
//! them into a single `ConfigError`.

mod helpers;
mod sections;


use crate::schema::PulseConfig;
use pulse_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &PulseConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    sections::validate_presence(&mut errors, config);
    sections::validate_chat(&mut errors, config);
    sections::validate_relay(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
