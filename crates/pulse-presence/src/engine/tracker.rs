//! Synchronous presence decisions, free of timers and I/O.

use pulse_common::ParticipantId;

use crate::clock::Timestamp;
use crate::protocol::Announcement;
use crate::sink::PresenceEvent;
use crate::store::PresenceStore;

use super::types::EngineConfig;

/// Turns announcements and sweep times into `Joined` / `Left` events.
#[derive(Debug)]
pub struct PresenceTracker {
    local: ParticipantId,
    stale_threshold_ms: u64,
    track_self: bool,
    store: PresenceStore,
}

impl PresenceTracker {
    /// A tracker with an empty roster.
    pub fn new(local: ParticipantId, config: &EngineConfig) -> Self {
        Self {
            local,
            stale_threshold_ms: config.stale_threshold_ms,
            track_self: config.track_self,
            store: PresenceStore::new(),
        }
    }

    pub fn local(&self) -> &ParticipantId {
        &self.local
    }

    /// What the local participant publishes each tick.
    pub fn self_announcement(&self) -> Announcement {
        Announcement::new(self.local.clone())
    }

    /// Record an announcement heard at `now`; `Joined` if it is a newcomer.
    pub fn on_announcement(
        &mut self,
        identity: &ParticipantId,
        now: Timestamp,
    ) -> Option<PresenceEvent> {
        if !self.track_self && *identity == self.local {
            return None;
        }
        self.store
            .observe(identity, now)
            .then(|| PresenceEvent::Joined {
                identity: identity.clone(),
            })
    }

    /// Evict everyone silent past the threshold; one `Left` per eviction.
    pub fn sweep(&mut self, now: Timestamp) -> Vec<PresenceEvent> {
        self.store
            .sweep(now, self.stale_threshold_ms)
            .into_iter()
            .map(|identity| PresenceEvent::Left { identity })
            .collect()
    }

    pub fn store(&self) -> &PresenceStore {
        &self.store
    }

    pub fn into_store(self) -> PresenceStore {
        self.store
    }
}
