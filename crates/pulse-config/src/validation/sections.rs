//! Per-section validators.

use crate::schema::PulseConfig;

use super::helpers::{validate_channel_name, validate_range};

pub(crate) fn validate_presence(errors: &mut Vec<String>, config: &PulseConfig) {
    let p = &config.presence;
    validate_range(
        errors,
        "presence.announce_interval_ms",
        p.announce_interval_ms,
        100,
        3_600_000,
    );
    if p.stale_threshold_ms <= p.announce_interval_ms {
        errors.push(format!(
            "presence.stale_threshold_ms = {} must exceed presence.announce_interval_ms = {}",
            p.stale_threshold_ms, p.announce_interval_ms
        ));
    }
    validate_channel_name(errors, "presence.channel", &p.channel);
}

pub(crate) fn validate_chat(errors: &mut Vec<String>, config: &PulseConfig) {
    let c = &config.chat;
    validate_channel_name(errors, "chat.channel", &c.channel);
    if c.channel == config.presence.channel {
        errors.push(format!(
            "chat.channel and presence.channel must differ (both are \"{}\")",
            c.channel
        ));
    }
    if let Some(name) = &c.username {
        if name.trim().is_empty() {
            errors.push("chat.username must not be blank when set".to_string());
        }
    }
}

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &PulseConfig) {
    let r = &config.relay;
    if !(r.url.starts_with("ws://") || r.url.starts_with("wss://")) {
        errors.push(format!("relay.url = \"{}\" must start with ws:// or wss://", r.url));
    }
    validate_range(errors, "relay.reconnect_delay_secs", r.reconnect_delay_secs, 1, 60);
    validate_range(
        errors,
        "relay.max_reconnect_delay_secs",
        r.max_reconnect_delay_secs,
        r.reconnect_delay_secs,
        3600,
    );
    validate_range(errors, "relay.connect_timeout_secs", r.connect_timeout_secs, 1, 120);
}
