//! Tracks which users are connected to which voice channel and their
//! mute/deafen/video flags, independent of the SFU's own transport/producer
//! bookkeeping (that lives in `ecto-voice`). Gateway and voice coordinator
//! both read this to build `voice.state_update` frames.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct VoiceMemberState {
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub self_mute: bool,
    pub self_deaf: bool,
    pub server_mute: bool,
    pub server_deaf: bool,
    pub video_enabled: bool,
}

#[derive(Default)]
pub struct VoiceStateManager {
    by_user: parking_lot::RwLock<HashMap<Uuid, VoiceMemberState>>,
}

impl VoiceStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, user_id: Uuid, channel_id: Uuid) -> VoiceMemberState {
        let state = VoiceMemberState {
            user_id,
            channel_id,
            self_mute: false,
            self_deaf: false,
            server_mute: false,
            server_deaf: false,
            video_enabled: false,
        };
        self.by_user.write().insert(user_id, state.clone());
        state
    }

    pub fn leave(&self, user_id: Uuid) -> Option<VoiceMemberState> {
        self.by_user.write().remove(&user_id)
    }

    pub fn get(&self, user_id: Uuid) -> Option<VoiceMemberState> {
        self.by_user.read().get(&user_id).cloned()
    }

    pub fn set_mute(&self, user_id: Uuid, self_mute: bool) {
        if let Some(state) = self.by_user.write().get_mut(&user_id) {
            state.self_mute = self_mute;
        }
    }

    pub fn set_server_mute(&self, user_id: Uuid, server_mute: bool) {
        if let Some(state) = self.by_user.write().get_mut(&user_id) {
            state.server_mute = server_mute;
        }
    }

    pub fn set_self_deaf(&self, user_id: Uuid, self_deaf: bool) {
        if let Some(state) = self.by_user.write().get_mut(&user_id) {
            state.self_deaf = self_deaf;
        }
    }

    pub fn members_in_channel(&self, channel_id: Uuid) -> Vec<VoiceMemberState> {
        self.by_user.read().values().filter(|s| s.channel_id == channel_id).cloned().collect()
    }

    /// Every tracked voice state server-wide, for the `system.ready` snapshot.
    pub fn all(&self) -> Vec<VoiceMemberState> {
        self.by_user.read().values().cloned().collect()
    }

    pub fn channel_size(&self, channel_id: Uuid) -> usize {
        self.by_user.read().values().filter(|s| s.channel_id == channel_id).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_then_leave_clears_state() {
        let manager = VoiceStateManager::new();
        let user = Uuid::now_v7();
        let channel = Uuid::now_v7();
        manager.join(user, channel);
        assert!(manager.get(user).is_some());
        assert_eq!(manager.channel_size(channel), 1);

        manager.leave(user);
        assert!(manager.get(user).is_none());
        assert_eq!(manager.channel_size(channel), 0);
    }

    #[test]
    fn joining_a_new_channel_replaces_the_old_entry() {
        let manager = VoiceStateManager::new();
        let user = Uuid::now_v7();
        let channel_a = Uuid::now_v7();
        let channel_b = Uuid::now_v7();
        manager.join(user, channel_a);
        manager.join(user, channel_b);

        assert_eq!(manager.channel_size(channel_a), 0);
        assert_eq!(manager.channel_size(channel_b), 1);
        assert_eq!(manager.get(user).unwrap().channel_id, channel_b);
    }

    #[test]
    fn set_mute_only_touches_self_mute() {
        let manager = VoiceStateManager::new();
        let user = Uuid::now_v7();
        manager.join(user, Uuid::now_v7());
        manager.set_mute(user, true);
        manager.set_self_deaf(user, true);
        manager.set_server_mute(user, true);

        let state = manager.get(user).unwrap();
        assert!(state.self_mute);
        assert!(state.self_deaf);
        assert!(state.server_mute);
        assert!(!state.video_enabled);
    }

    #[test]
    fn members_in_channel_filters_correctly() {
        let manager = VoiceStateManager::new();
        let channel = Uuid::now_v7();
        let other_channel = Uuid::now_v7();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        manager.join(alice, channel);
        manager.join(bob, other_channel);

        let members = manager.members_in_channel(channel);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, alice);
    }
}
