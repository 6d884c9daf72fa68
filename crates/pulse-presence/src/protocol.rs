//! Application payloads carried on the presence and chat channels.
//!
//! Both payloads are plain JSON objects keyed by `user`. Extra fields
//! (location, tags) may ride along from other clients and are ignored.

use serde::{Deserialize, Serialize};

use pulse_common::ParticipantId;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload has an empty `user`")]
    EmptyUser,
}

/// Liveness announcement published on the presence channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub user: ParticipantId,
}

impl Announcement {
    pub fn new(user: ParticipantId) -> Self {
        Self { user }
    }

    /// Decode an inbound payload, rejecting anything without a usable `user`.
    pub fn decode(payload: &serde_json::Value) -> Result<Self, ProtocolError> {
        let announcement = Self::deserialize(payload)?;
        if announcement.user.as_str().is_empty() {
            return Err(ProtocolError::EmptyUser);
        }
        Ok(announcement)
    }

    pub fn encode(&self) -> Result<serde_json::Value, ProtocolError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Chat line published on the message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub user: ParticipantId,
    pub text: String,
}

impl ChatPayload {
    pub fn new(user: ParticipantId, text: impl Into<String>) -> Self {
        Self {
            user,
            text: text.into(),
        }
    }

    pub fn decode(payload: &serde_json::Value) -> Result<Self, ProtocolError> {
        let message = Self::deserialize(payload)?;
        if message.user.as_str().is_empty() {
            return Err(ProtocolError::EmptyUser);
        }
        Ok(message)
    }

    pub fn encode(&self) -> Result<serde_json::Value, ProtocolError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn announcement_wire_shape() {
        let value = Announcement::new("alice".into()).encode().unwrap();
        assert_eq!(value, json!({ "user": "alice" }));
    }

    #[test]
    fn announcement_ignores_extra_fields() {
        let a = Announcement::decode(&json!({ "user": "bob", "lat": "1.0", "lon": "2.0" })).unwrap();
        assert_eq!(a.user.as_str(), "bob");
    }

    #[test]
    fn announcement_without_user_is_rejected() {
        let err = Announcement::decode(&json!({ "name": "bob" })).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));

        let err = Announcement::decode(&json!({ "user": 42 })).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));

        let err = Announcement::decode(&json!("bob")).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn announcement_with_empty_user_is_rejected() {
        let err = Announcement::decode(&json!({ "user": "" })).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyUser));
        assert_eq!(err.to_string(), "payload has an empty `user`");
    }

    #[test]
    fn chat_payload_wire_shape() {
        let value = ChatPayload::new("carol".into(), "hi all").encode().unwrap();
        assert_eq!(value, json!({ "user": "carol", "text": "hi all" }));
    }

    #[test]
    fn chat_payload_requires_text() {
        let err = ChatPayload::decode(&json!({ "user": "carol" })).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));

        let msg = ChatPayload::decode(&json!({ "user": "carol", "text": "", "tag": "x" })).unwrap();
        assert_eq!(msg.text, "");
    }
}
