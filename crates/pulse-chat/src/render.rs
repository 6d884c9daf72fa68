//! Terminal rendering of presence and chat events.

use chrono::{DateTime, TimeZone};

use pulse_presence::{ParticipantId, PresenceEvent};

pub fn event_line<Tz>(event: &PresenceEvent, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let stamp = at.format("%H:%M:%S");
    match event {
        PresenceEvent::Joined { identity } => format!("[{stamp}] * {identity} is online"),
        PresenceEvent::Left { identity } => format!("[{stamp}] * {identity} went offline"),
        PresenceEvent::ChatMessage { user, text } => format!("[{stamp}] <{user}> {text}"),
        PresenceEvent::ConnectionState { connected: true } => {
            format!("[{stamp}] -- online")
        }
        PresenceEvent::ConnectionState { connected: false } => {
            format!("[{stamp}] -- offline, reconnecting")
        }
        PresenceEvent::Info { message } => format!("[{stamp}] -- {message}"),
    }
}

pub fn roster_line(online: &[ParticipantId]) -> String {
    if online.is_empty() {
        return "nobody online".to_string();
    }
    let names: Vec<&str> = online.iter().map(ParticipantId::as_str).collect();
    let noun = if online.len() == 1 { "user" } else { "users" };
    format!("{} {noun} online: {}", online.len(), names.join(", "))
}
