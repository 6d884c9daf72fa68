//! Presence engine: periodic self-announcement, roster sweeps, join/leave
//! detection.
//!
//! [`PresenceTracker`] is the synchronous decision logic. [`PresenceEngine`]
//! drives it from a single actor task that owns the tracker and receives
//! both timer ticks and inbound announcements, so roster access is
//! serialized without a lock.

mod driver;
mod tracker;
mod types;

#[cfg(test)]
mod tests;

pub use driver::PresenceEngine;
pub use tracker::PresenceTracker;
pub use types::{EngineConfig, EngineError};
