use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("presence.channel is empty".into());
        assert_eq!(
            err.to_string(),
            "config validation error: presence.channel is empty"
        );
    }

    #[test]
    fn pulse_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: PulseError = config_err.into();
        assert!(matches!(err, PulseError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn pulse_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: PulseError = io_err.into();
        assert!(matches!(err, PulseError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn pulse_error_other_variants() {
        let err = PulseError::Transport("not connected".into());
        assert_eq!(err.to_string(), "transport error: not connected");

        let err = PulseError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}
