//! Per-channel router lifecycle and the transport/producer/consumer
//! indices a voice session needs to look things up by id in either
//! direction (id → owner, owner → ids).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::worker::WorkerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportDirection {
    Send,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

pub struct Transport {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub direction: TransportDirection,
}

pub struct Producer {
    pub id: Uuid,
    pub transport_id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub kind: MediaKind,
    pub source: Option<String>,
    pub paused: bool,
}

pub struct Consumer {
    pub id: Uuid,
    pub transport_id: Uuid,
    pub producer_id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub rtp_parameters: serde_json::Value,
    pub paused: bool,
}

#[derive(Default)]
struct UserVoiceHandles {
    send_transport: Option<Uuid>,
    send_transport_params: serde_json::Value,
    recv_transport: Option<Uuid>,
    recv_transport_params: serde_json::Value,
    producers: Vec<Uuid>,
    consumers: Vec<Uuid>,
}

/// Snapshot of a member's already-registered transports, handed back by
/// [`RouterRegistry::existing_join`] so a repeat `voice.join` to the same
/// channel is a no-op instead of allocating new transports.
pub struct ExistingJoin {
    pub worker_id: WorkerId,
    pub send_transport_id: Uuid,
    pub send_transport_params: serde_json::Value,
    pub recv_transport_id: Uuid,
    pub recv_transport_params: serde_json::Value,
}

struct RouterState {
    worker_id: WorkerId,
    members: HashMap<Uuid, UserVoiceHandles>,
}

/// Owns every live `Router` (one per voice channel with at least one
/// member) plus the id→owner lookup tables shared across the whole
/// coordinator. A single `parking_lot::Mutex` serializes all mutation —
/// call sites are already serialized per-session upstream, so contention
/// here is cross-session only and brief.
#[derive(Default)]
pub struct RouterRegistry {
    routers: HashMap<Uuid, RouterState>,
    transports: HashMap<Uuid, Transport>,
    producers: HashMap<Uuid, Producer>,
    consumers: HashMap<Uuid, Consumer>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn router_exists(&self, channel_id: Uuid) -> bool {
        self.routers.contains_key(&channel_id)
    }

    pub fn create_router(&mut self, channel_id: Uuid, worker_id: WorkerId) {
        self.routers.entry(channel_id).or_insert_with(|| RouterState { worker_id, members: HashMap::new() });
    }

    pub fn router_worker(&self, channel_id: Uuid) -> Option<WorkerId> {
        self.routers.get(&channel_id).map(|r| r.worker_id)
    }

    pub fn channel_member_count(&self, channel_id: Uuid) -> usize {
        self.routers.get(&channel_id).map(|r| r.members.len()).unwrap_or(0)
    }

    pub fn members_in_channel(&self, channel_id: Uuid) -> Vec<Uuid> {
        self.routers.get(&channel_id).map(|r| r.members.keys().copied().collect()).unwrap_or_default()
    }

    pub fn register_transport(&mut self, transport: Transport, params: serde_json::Value) {
        let channel_id = transport.channel_id;
        let user_id = transport.user_id;
        let direction = transport.direction;
        let id = transport.id;
        self.transports.insert(id, transport);
        if let Some(router) = self.routers.get_mut(&channel_id) {
            let handles = router.members.entry(user_id).or_default();
            match direction {
                TransportDirection::Send => {
                    handles.send_transport = Some(id);
                    handles.send_transport_params = params;
                }
                TransportDirection::Recv => {
                    handles.recv_transport = Some(id);
                    handles.recv_transport_params = params;
                }
            }
        }
    }

    /// If `user_id` already has both transports registered in `channel_id`,
    /// returns them so the caller can skip re-allocating anything.
    pub fn existing_join(&self, channel_id: Uuid, user_id: Uuid) -> Option<ExistingJoin> {
        let router = self.routers.get(&channel_id)?;
        let handles = router.members.get(&user_id)?;
        let send_transport_id = handles.send_transport?;
        let recv_transport_id = handles.recv_transport?;
        Some(ExistingJoin {
            worker_id: router.worker_id,
            send_transport_id,
            send_transport_params: handles.send_transport_params.clone(),
            recv_transport_id,
            recv_transport_params: handles.recv_transport_params.clone(),
        })
    }

    pub fn transport(&self, transport_id: Uuid) -> Option<&Transport> {
        self.transports.get(&transport_id)
    }

    /// The recv-transport id a given member's consumers attach to.
    pub fn recv_transport_for(&self, channel_id: Uuid, user_id: Uuid) -> Option<Uuid> {
        self.routers.get(&channel_id)?.members.get(&user_id)?.recv_transport
    }

    pub fn register_producer(&mut self, producer: Producer) {
        let channel_id = producer.channel_id;
        let user_id = producer.user_id;
        let id = producer.id;
        self.producers.insert(id, producer);
        if let Some(router) = self.routers.get_mut(&channel_id) {
            router.members.entry(user_id).or_default().producers.push(id);
        }
    }

    pub fn producer(&self, producer_id: Uuid) -> Option<&Producer> {
        self.producers.get(&producer_id)
    }

    pub fn producer_mut(&mut self, producer_id: Uuid) -> Option<&mut Producer> {
        self.producers.get_mut(&producer_id)
    }

    /// Every producer already in `channel_id` belonging to someone other
    /// than `except_user`, used to fan out `voice.new_consumer` to a
    /// freshly joined member.
    pub fn other_producers(&self, channel_id: Uuid, except_user: Uuid) -> Vec<&Producer> {
        self.routers
            .get(&channel_id)
            .map(|router| {
                router
                    .members
                    .iter()
                    .filter(|(user_id, _)| **user_id != except_user)
                    .flat_map(|(_, handles)| handles.producers.iter())
                    .filter_map(|id| self.producers.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of every audio producer `user_id` owns in `channel_id`, used to
    /// pause/resume all of them at once for a self-mute toggle.
    pub fn user_audio_producer_ids(&self, channel_id: Uuid, user_id: Uuid) -> Vec<Uuid> {
        self.routers
            .get(&channel_id)
            .and_then(|router| router.members.get(&user_id))
            .map(|handles| {
                handles
                    .producers
                    .iter()
                    .filter(|id| self.producers.get(*id).map(|p| p.kind == MediaKind::Audio).unwrap_or(false))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn register_consumer(&mut self, consumer: Consumer) {
        let channel_id = consumer.channel_id;
        let user_id = consumer.user_id;
        let id = consumer.id;
        self.consumers.insert(id, consumer);
        if let Some(router) = self.routers.get_mut(&channel_id) {
            router.members.entry(user_id).or_default().consumers.push(id);
        }
    }

    pub fn consumer_mut(&mut self, consumer_id: Uuid) -> Option<&mut Consumer> {
        self.consumers.get_mut(&consumer_id)
    }

    /// Every consumer `user_id` already holds in `channel_id`, paired with
    /// the producer it consumes. Used to rebuild a `voice.join` reply
    /// without re-requesting anything from the media worker when the join
    /// is a no-op repeat.
    pub fn user_consumers_with_producers(&self, channel_id: Uuid, user_id: Uuid) -> Vec<(&Consumer, &Producer)> {
        self.routers
            .get(&channel_id)
            .and_then(|router| router.members.get(&user_id))
            .map(|handles| {
                handles
                    .consumers
                    .iter()
                    .filter_map(|id| self.consumers.get(id))
                    .filter_map(|consumer| self.producers.get(&consumer.producer_id).map(|producer| (consumer, producer)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remove_producer(&mut self, producer_id: Uuid) -> Option<Producer> {
        let producer = self.producers.remove(&producer_id)?;
        if let Some(router) = self.routers.get_mut(&producer.channel_id) {
            if let Some(handles) = router.members.get_mut(&producer.user_id) {
                handles.producers.retain(|id| *id != producer_id);
            }
        }
        Some(producer)
    }

    /// Tears down every transport/producer/consumer owned by `user_id` in
    /// `channel_id`, removes them from the member map, and destroys the
    /// router if it becomes empty. Returns the ids of producers/consumers
    /// that were closed, so the caller can fan out `voice.producer_closed`.
    pub fn remove_member(&mut self, channel_id: Uuid, user_id: Uuid) -> RemovedMember {
        let mut removed = RemovedMember::default();
        let Some(router) = self.routers.get_mut(&channel_id) else {
            return removed;
        };
        let Some(handles) = router.members.remove(&user_id) else {
            return removed;
        };
        for producer_id in handles.producers {
            self.producers.remove(&producer_id);
            removed.producers.push(producer_id);
        }
        for consumer_id in handles.consumers {
            self.consumers.remove(&consumer_id);
            removed.consumers.push(consumer_id);
        }
        if let Some(id) = handles.send_transport {
            self.transports.remove(&id);
        }
        if let Some(id) = handles.recv_transport {
            self.transports.remove(&id);
        }
        if router.members.is_empty() {
            self.routers.remove(&channel_id);
            removed.router_closed = true;
        }
        removed
    }
}

#[derive(Default)]
pub struct RemovedMember {
    pub producers: Vec<Uuid>,
    pub consumers: Vec<Uuid>,
    pub router_closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_created_lazily_and_destroyed_when_empty() {
        let mut registry = RouterRegistry::new();
        let channel = Uuid::now_v7();
        assert!(!registry.router_exists(channel));

        registry.create_router(channel, 0u32);
        assert!(registry.router_exists(channel));

        let user = Uuid::now_v7();
        registry.register_transport(Transport { id: Uuid::now_v7(), channel_id: channel, user_id: user, direction: TransportDirection::Send }, serde_json::Value::Null);
        let removed = registry.remove_member(channel, user);
        assert!(removed.router_closed);
        assert!(!registry.router_exists(channel));
    }

    #[test]
    fn other_producers_excludes_caller_and_includes_peers() {
        let mut registry = RouterRegistry::new();
        let channel = Uuid::now_v7();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        registry.create_router(channel, 0u32);
        registry.register_transport(Transport { id: Uuid::now_v7(), channel_id: channel, user_id: alice, direction: TransportDirection::Send }, serde_json::Value::Null);
        registry.register_transport(Transport { id: Uuid::now_v7(), channel_id: channel, user_id: bob, direction: TransportDirection::Send }, serde_json::Value::Null);

        let alice_producer = Uuid::now_v7();
        registry.register_producer(Producer {
            id: alice_producer,
            transport_id: Uuid::now_v7(),
            channel_id: channel,
            user_id: alice,
            kind: MediaKind::Audio,
            source: None,
            paused: false,
        });

        let seen_by_bob = registry.other_producers(channel, bob);
        assert_eq!(seen_by_bob.len(), 1);
        assert_eq!(seen_by_bob[0].id, alice_producer);

        let seen_by_alice = registry.other_producers(channel, alice);
        assert!(seen_by_alice.is_empty());
    }

    #[test]
    fn user_audio_producer_ids_filters_by_kind() {
        let mut registry = RouterRegistry::new();
        let channel = Uuid::now_v7();
        let user = Uuid::now_v7();
        registry.create_router(channel, 0u32);
        registry.register_transport(Transport { id: Uuid::now_v7(), channel_id: channel, user_id: user, direction: TransportDirection::Send }, serde_json::Value::Null);

        let audio_id = Uuid::now_v7();
        let video_id = Uuid::now_v7();
        registry.register_producer(Producer { id: audio_id, transport_id: Uuid::now_v7(), channel_id: channel, user_id: user, kind: MediaKind::Audio, source: None, paused: false });
        registry.register_producer(Producer { id: video_id, transport_id: Uuid::now_v7(), channel_id: channel, user_id: user, kind: MediaKind::Video, source: None, paused: false });

        let audio_only = registry.user_audio_producer_ids(channel, user);
        assert_eq!(audio_only, vec![audio_id]);
    }

    #[test]
    fn remove_member_tears_down_transports_producers_consumers() {
        let mut registry = RouterRegistry::new();
        let channel = Uuid::now_v7();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        registry.create_router(channel, 0u32);
        registry.register_transport(Transport { id: Uuid::now_v7(), channel_id: channel, user_id: alice, direction: TransportDirection::Send }, serde_json::Value::Null);
        let bob_recv = Uuid::now_v7();
        registry.register_transport(Transport { id: bob_recv, channel_id: channel, user_id: bob, direction: TransportDirection::Recv }, serde_json::Value::Null);

        let producer_id = Uuid::now_v7();
        registry.register_producer(Producer { id: producer_id, transport_id: Uuid::now_v7(), channel_id: channel, user_id: alice, kind: MediaKind::Audio, source: None, paused: false });
        let consumer_id = Uuid::now_v7();
        registry.register_consumer(Consumer {
            id: consumer_id,
            transport_id: bob_recv,
            producer_id,
            channel_id: channel,
            user_id: bob,
            rtp_parameters: serde_json::Value::Null,
            paused: true,
        });

        let removed = registry.remove_member(channel, alice);
        assert_eq!(removed.producers, vec![producer_id]);
        assert!(removed.consumers.is_empty());
        assert!(!removed.router_closed, "bob is still in the channel");
        assert!(registry.producer(producer_id).is_none());

        let removed_bob = registry.remove_member(channel, bob);
        assert_eq!(removed_bob.consumers, vec![consumer_id]);
        assert!(removed_bob.router_closed);
    }

    #[test]
    fn recv_transport_for_tracks_the_right_direction() {
        let mut registry = RouterRegistry::new();
        let channel = Uuid::now_v7();
        let user = Uuid::now_v7();
        registry.create_router(channel, 0u32);
        let send_id = Uuid::now_v7();
        let recv_id = Uuid::now_v7();
        registry.register_transport(Transport { id: send_id, channel_id: channel, user_id: user, direction: TransportDirection::Send }, serde_json::Value::Null);
        registry.register_transport(Transport { id: recv_id, channel_id: channel, user_id: user, direction: TransportDirection::Recv }, serde_json::Value::Null);

        assert_eq!(registry.recv_transport_for(channel, user), Some(recv_id));
        assert_ne!(registry.recv_transport_for(channel, user), Some(send_id));
    }

    #[test]
    fn existing_join_is_none_until_both_transports_registered() {
        let mut registry = RouterRegistry::new();
        let channel = Uuid::now_v7();
        let user = Uuid::now_v7();
        registry.create_router(channel, 0u32);
        assert!(registry.existing_join(channel, user).is_none());

        let send_id = Uuid::now_v7();
        registry.register_transport(
            Transport { id: send_id, channel_id: channel, user_id: user, direction: TransportDirection::Send },
            serde_json::json!({ "id": send_id }),
        );
        assert!(registry.existing_join(channel, user).is_none(), "recv transport still missing");

        let recv_id = Uuid::now_v7();
        registry.register_transport(
            Transport { id: recv_id, channel_id: channel, user_id: user, direction: TransportDirection::Recv },
            serde_json::json!({ "id": recv_id }),
        );
        let existing = registry.existing_join(channel, user).expect("both transports now registered");
        assert_eq!(existing.send_transport_id, send_id);
        assert_eq!(existing.recv_transport_id, recv_id);
        assert_eq!(existing.send_transport_params, serde_json::json!({ "id": send_id }));
    }
}
