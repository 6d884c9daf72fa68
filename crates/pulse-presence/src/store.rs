//! In-memory roster: who was heard from, and when.

use std::collections::HashMap;

use pulse_common::ParticipantId;

use crate::clock::Timestamp;

/// Maps each participant believed online to the time of its last announcement.
///
/// A key is present exactly while the participant is considered online.
/// Absence means either "never seen" or "swept as stale".
#[derive(Debug, Default, Clone)]
pub struct PresenceStore {
    last_seen: HashMap<ParticipantId, Timestamp>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an announcement from `identity` at `now`.
    ///
    /// Returns `true` when the identity was not tracked before, i.e. a join
    /// should be reported.
    pub fn observe(&mut self, identity: &ParticipantId, now: Timestamp) -> bool {
        match self.last_seen.get_mut(identity.as_str()) {
            Some(seen) => {
                // Late or reordered deliveries never move an entry back in time.
                *seen = (*seen).max(now);
                false
            }
            None => {
                self.last_seen.insert(identity.clone(), now);
                true
            }
        }
    }

    /// Remove and return every identity silent for more than `stale_threshold_ms`.
    ///
    /// Entries still within the threshold are left untouched. The order of
    /// the returned identities is unspecified.
    pub fn sweep(&mut self, now: Timestamp, stale_threshold_ms: u64) -> Vec<ParticipantId> {
        let mut expired = Vec::new();
        self.last_seen.retain(|identity, seen| {
            let stale = now.saturating_sub(*seen) > stale_threshold_ms;
            if stale {
                expired.push(identity.clone());
            }
            !stale
        });
        expired
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.last_seen.contains_key(identity)
    }

    pub fn last_seen(&self, identity: &str) -> Option<Timestamp> {
        self.last_seen.get(identity).copied()
    }

    /// Tracked identities, sorted for stable display.
    pub fn identities(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.last_seen.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear(&mut self) {
        self.last_seen.clear();
    }
}
