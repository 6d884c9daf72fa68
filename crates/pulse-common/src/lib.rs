pub mod errors;
pub mod id;

pub use errors::{ConfigError, PulseError};
pub use id::{short_id, ParticipantId};

pub type Result<T> = std::result::Result<T, PulseError>;
