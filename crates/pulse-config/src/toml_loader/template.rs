//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Pulse Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[presence]
# announce_interval_ms = 5000    # 100-3600000
# stale_threshold_ms = 15000     # must exceed announce_interval_ms
# channel = "presence"
# track_self = true              # list yourself among online users

[chat]
# username = "alice"             # generated when unset
# channel = "messages"

[relay]
# url = "ws://127.0.0.1:8080"
# reconnect_delay_secs = 1       # 1-60
# max_reconnect_delay_secs = 30  # >= reconnect_delay_secs, <= 3600
# connect_timeout_secs = 15      # 1-120

[logging]
# level = "INFO"                 # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
