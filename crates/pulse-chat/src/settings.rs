//! Map the on-disk config (plus CLI overrides) onto runtime settings.

use pulse_common::{ConfigError, ParticipantId};
use pulse_config::{validation, PulseConfig};
use pulse_presence::ws::WsConfig;
use pulse_presence::{ChatSettings, EngineConfig};

use crate::cli::Args;

/// Apply command-line overrides and re-validate.
pub fn apply_overrides(mut config: PulseConfig, args: &Args) -> Result<PulseConfig, ConfigError> {
    if let Some(ref name) = args.username {
        config.chat.username = Some(name.clone());
    }
    if let Some(ref url) = args.relay {
        config.relay.url = url.clone();
    }
    validation::validate(&config)?;
    Ok(config)
}

pub fn identity(config: &PulseConfig) -> ParticipantId {
    match config.chat.username.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => ParticipantId::new(name),
        _ => ParticipantId::generate(),
    }
}

pub fn chat_settings(config: &PulseConfig) -> ChatSettings {
    let p = &config.presence;
    ChatSettings {
        presence: EngineConfig {
            announce_interval: p.announce_interval(),
            stale_threshold_ms: p.stale_threshold_ms,
            channel: p.channel.clone(),
            track_self: p.track_self,
        },
        chat_channel: config.chat.channel.clone(),
    }
}

pub fn ws_config(config: &PulseConfig) -> WsConfig {
    let r = &config.relay;
    WsConfig {
        url: r.url.clone(),
        reconnect_delay_secs: r.reconnect_delay_secs,
        max_reconnect_delay_secs: r.max_reconnect_delay_secs,
        connect_timeout_secs: r.connect_timeout_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["pulse-chat"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_map_onto_engine_settings() {
        let settings = chat_settings(&PulseConfig::default());
        assert_eq!(settings.presence.announce_interval, Duration::from_millis(5000));
        assert_eq!(settings.presence.stale_threshold_ms, 15000);
        assert_eq!(settings.presence.channel, "presence");
        assert!(settings.presence.track_self);
        assert_eq!(settings.chat_channel, "messages");
        assert!(settings.presence.validate().is_ok());
    }

    #[test]
    fn relay_settings_carry_over() {
        let mut config = PulseConfig::default();
        config.relay.reconnect_delay_secs = 2;
        let ws = ws_config(&config);
        assert_eq!(ws.url, "ws://127.0.0.1:8080");
        assert_eq!(ws.reconnect_delay_secs, 2);
        assert_eq!(ws.max_reconnect_delay_secs, 30);
        assert_eq!(ws.connect_timeout_secs, 15);
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut config = PulseConfig::default();
        config.chat.username = Some("bob".into());
        let config = apply_overrides(
            config,
            &args(&["--username", "alice", "--relay", "wss://example.org"]),
        )
        .unwrap();
        assert_eq!(config.chat.username.as_deref(), Some("alice"));
        assert_eq!(config.relay.url, "wss://example.org");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let result = apply_overrides(PulseConfig::default(), &args(&["--relay", "http://nope"]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn configured_username_is_used() {
        let mut config = PulseConfig::default();
        config.chat.username = Some(" alice ".into());
        assert_eq!(identity(&config).as_str(), "alice");
    }

    #[test]
    fn missing_username_is_generated() {
        let id = identity(&PulseConfig::default());
        assert!(id.as_str().starts_with("user-"));
        assert_eq!(id.as_str().len(), "user-".len() + 8);
    }
}
