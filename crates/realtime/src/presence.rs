//! User presence tracking with a disconnect grace period.
//!
//! A user's last socket dropping doesn't immediately flip them to offline —
//! a page reload or a flaky mobile network looks identical to a real
//! disconnect for the first few seconds, so we hold `Offline` behind
//! [`ecto_protocol::PRESENCE_OFFLINE_GRACE_SECS`] and let a reconnect cancel it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ecto_protocol::PRESENCE_OFFLINE_GRACE_SECS;
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    Offline,
}

struct PresenceEntry {
    status: PresenceStatus,
    /// Set when the last session for this user disconnected; cleared on
    /// reconnect. Once this timestamp is older than the grace period the
    /// user is considered actually offline.
    disconnected_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct PresenceManager {
    entries: RwLock<HashMap<Uuid, PresenceEntry>>,
}

impl PresenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call when a user's first session of the set connects, or when they
    /// explicitly set a status. Cancels any pending offline grace window.
    pub fn set_online(&self, user_id: Uuid, status: PresenceStatus) {
        self.entries.write().insert(user_id, PresenceEntry { status, disconnected_at: None });
    }

    /// Call when a user's last session disconnects. Doesn't flip status
    /// immediately — starts the grace window instead.
    pub fn mark_disconnected(&self, user_id: Uuid) {
        if let Some(entry) = self.entries.write().get_mut(&user_id) {
            entry.disconnected_at = Some(Utc::now());
        }
    }

    /// Returns the effective status, resolving an expired grace window to
    /// `Offline` as a side effect.
    pub fn status(&self, user_id: Uuid) -> PresenceStatus {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&user_id) else {
            return PresenceStatus::Offline;
        };
        if let Some(disconnected_at) = entry.disconnected_at {
            let elapsed = Utc::now().signed_duration_since(disconnected_at);
            if elapsed.num_seconds() >= PRESENCE_OFFLINE_GRACE_SECS as i64 {
                entry.status = PresenceStatus::Offline;
            }
        }
        entry.status
    }

    /// Users whose grace window has just expired — callers broadcast an
    /// offline presence update for each and then drop them from tracking.
    pub fn sweep_expired(&self) -> Vec<Uuid> {
        let mut entries = self.entries.write();
        let now = Utc::now();
        let expired: Vec<Uuid> = entries
            .iter()
            .filter_map(|(user_id, entry)| {
                let disconnected_at = entry.disconnected_at?;
                let elapsed = now.signed_duration_since(disconnected_at).num_seconds();
                (elapsed >= PRESENCE_OFFLINE_GRACE_SECS as i64).then_some(*user_id)
            })
            .collect();
        for user_id in &expired {
            entries.remove(user_id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_reads_as_offline() {
        let manager = PresenceManager::new();
        assert_eq!(manager.status(Uuid::now_v7()), PresenceStatus::Offline);
    }

    #[test]
    fn set_online_is_immediately_visible() {
        let manager = PresenceManager::new();
        let user = Uuid::now_v7();
        manager.set_online(user, PresenceStatus::Online);
        assert_eq!(manager.status(user), PresenceStatus::Online);
    }

    #[test]
    fn disconnect_does_not_flip_status_before_grace_expires() {
        let manager = PresenceManager::new();
        let user = Uuid::now_v7();
        manager.set_online(user, PresenceStatus::Online);
        manager.mark_disconnected(user);
        // Grace window is minutes long; immediately after disconnect the
        // user still reads as their last status.
        assert_eq!(manager.status(user), PresenceStatus::Online);
        assert!(manager.sweep_expired().is_empty());
    }

    #[test]
    fn reconnect_cancels_the_grace_window() {
        let manager = PresenceManager::new();
        let user = Uuid::now_v7();
        manager.set_online(user, PresenceStatus::Online);
        manager.mark_disconnected(user);
        manager.set_online(user, PresenceStatus::Online);
        assert_eq!(manager.status(user), PresenceStatus::Online);
        assert!(manager.sweep_expired().is_empty());
    }
}
