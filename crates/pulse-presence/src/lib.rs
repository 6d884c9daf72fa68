//! Presence tracking for pulse chat.
//!
//! Every participant periodically announces itself on a shared presence
//! channel. The [`PresenceEngine`] ingests those announcements, keeps a
//! roster of who was heard from recently and reports `Joined` / `Left`
//! transitions to registered observers. [`ChatClient`] bundles the engine
//! with the chat channel and connection-state forwarding.
//!
//! Transports are pluggable through [`ChannelTransport`]: [`LocalHub`] is an
//! in-process bus, [`ws::WsTransport`] talks to a `pulse-relay` server.

pub mod client;
pub mod clock;
pub mod engine;
pub mod hub;
pub mod protocol;
pub mod sink;
pub mod store;
pub mod transport;
pub mod ws;

pub use client::{ChatClient, ChatSettings};
pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use engine::{EngineConfig, EngineError, PresenceEngine, PresenceTracker};
pub use hub::LocalHub;
pub use protocol::{Announcement, ChatPayload, ProtocolError};
pub use pulse_common::ParticipantId;
pub use sink::{PresenceEvent, SinkId, SinkRegistry, Subscription};
pub use store::PresenceStore;
pub use transport::{ChannelTransport, TransportError, TransportNotice};
