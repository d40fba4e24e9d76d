//! Public API for the voice control plane: join/leave, transport/producer/
//! consumer lifecycle, mute, and teardown. Wraps [`RouterRegistry`] +
//! [`WorkerPool`] + [`WorkerRouter`] behind the operations a WS handler
//! calls directly, one per `voice.*` client message.

use ecto_domain::{EctoError, Result};
use ecto_protocol::MAX_VOICE_PARTICIPANTS;
use ecto_realtime::VoiceStateManager;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::router::{Consumer, MediaKind, Producer, RouterRegistry, Transport, TransportDirection};
use crate::worker::WorkerPool;
use crate::worker_channel::WorkerRouter;

#[derive(Debug, Clone, Serialize)]
pub struct NewConsumerInfo {
    pub consumer_id: Uuid,
    pub producer_id: Uuid,
    pub user_id: Uuid,
    pub kind: MediaKind,
    pub rtp_parameters: Value,
    pub source: Option<String>,
}

pub struct JoinResult {
    pub router_capabilities: Value,
    pub send_transport_id: Uuid,
    pub send_transport_params: Value,
    pub recv_transport_id: Uuid,
    pub recv_transport_params: Value,
    pub existing_producers: Vec<NewConsumerInfo>,
}

pub struct VoiceCoordinator {
    registry: Mutex<RouterRegistry>,
    workers: WorkerPool,
    worker_router: WorkerRouter,
    pub voice_state: VoiceStateManager,
}

impl VoiceCoordinator {
    pub fn new(workers: WorkerPool, worker_router: WorkerRouter) -> Self {
        Self { registry: Mutex::new(RouterRegistry::new()), workers, worker_router, voice_state: VoiceStateManager::new() }
    }

    /// Number of live media workers — used by the readiness probe.
    pub fn worker_count(&self) -> usize {
        self.workers.alive_worker_count()
    }

    /// Joins `user_id` to `channel_id`'s voice session. If the user is
    /// already in a different voice channel, the caller must have already
    /// called [`Self::leave`] for the old one and broadcast the removal —
    /// the per-session serialization point (one voice message processed at
    /// a time per session) lives in the WS handler, not here.
    pub async fn join(&self, channel_id: Uuid, user_id: Uuid) -> Result<JoinResult> {
        if let Some(existing) = self.registry.lock().existing_join(channel_id, user_id) {
            let router_capabilities = self.worker_router.request(existing.worker_id, "routerCapabilities", Value::Null).await?;
            let existing_producers = self
                .registry
                .lock()
                .user_consumers_with_producers(channel_id, user_id)
                .into_iter()
                .map(|(consumer, producer)| NewConsumerInfo {
                    consumer_id: consumer.id,
                    producer_id: producer.id,
                    user_id: producer.user_id,
                    kind: producer.kind,
                    rtp_parameters: consumer.rtp_parameters.clone(),
                    source: producer.source.clone(),
                })
                .collect();
            self.voice_state.join(user_id, channel_id);
            return Ok(JoinResult {
                router_capabilities,
                send_transport_id: existing.send_transport_id,
                send_transport_params: existing.send_transport_params,
                recv_transport_id: existing.recv_transport_id,
                recv_transport_params: existing.recv_transport_params,
                existing_producers,
            });
        }

        let current_size = {
            let registry = self.registry.lock();
            registry.channel_member_count(channel_id)
        };
        if current_size >= MAX_VOICE_PARTICIPANTS {
            return Err(EctoError::Voice {
                code: ecto_domain::error::codes::VOICE_CHANNEL_FULL,
                message: "voice channel is at capacity".into(),
            });
        }

        let worker_id = {
            let mut registry = self.registry.lock();
            if !registry.router_exists(channel_id) {
                let worker_id = self.workers.assign_router(channel_id);
                registry.create_router(channel_id, worker_id);
                worker_id
            } else {
                registry.router_worker(channel_id).expect("router exists")
            }
        };

        let router_capabilities = self.worker_router.request(worker_id, "routerCapabilities", Value::Null).await?;

        let send_transport_id = Uuid::now_v7();
        let send_transport_params = self
            .worker_router
            .request(worker_id, "createTransport", serde_json::json!({ "transport_id": send_transport_id }))
            .await?;
        let recv_transport_id = Uuid::now_v7();
        let recv_transport_params = self
            .worker_router
            .request(worker_id, "createTransport", serde_json::json!({ "transport_id": recv_transport_id }))
            .await?;

        let existing_producers = {
            let mut registry = self.registry.lock();
            registry.register_transport(
                Transport { id: send_transport_id, channel_id, user_id, direction: TransportDirection::Send },
                send_transport_params.clone(),
            );
            registry.register_transport(
                Transport { id: recv_transport_id, channel_id, user_id, direction: TransportDirection::Recv },
                recv_transport_params.clone(),
            );
            registry
                .other_producers(channel_id, user_id)
                .into_iter()
                .map(|p| (p.id, p.user_id, p.kind, p.source.clone()))
                .collect::<Vec<_>>()
        };

        let mut consumers = Vec::with_capacity(existing_producers.len());
        for (producer_id, owner_id, kind, source) in existing_producers {
            let params = self
                .worker_router
                .request(
                    worker_id,
                    "createConsumer",
                    serde_json::json!({ "transport_id": recv_transport_id, "producer_id": producer_id, "paused": true }),
                )
                .await?;
            let consumer_id = Uuid::now_v7();
            self.registry.lock().register_consumer(Consumer {
                id: consumer_id,
                transport_id: recv_transport_id,
                producer_id,
                channel_id,
                user_id,
                rtp_parameters: params.clone(),
                paused: true,
            });
            consumers.push(NewConsumerInfo { consumer_id, producer_id, user_id: owner_id, kind, rtp_parameters: params, source });
        }

        self.voice_state.join(user_id, channel_id);

        Ok(JoinResult {
            router_capabilities,
            send_transport_id,
            send_transport_params,
            recv_transport_id,
            recv_transport_params,
            existing_producers: consumers,
        })
    }

    /// Tears down everything the user owns in `channel_id`. Returns the
    /// closed producer/consumer ids (for `voice.producer_closed` fan-out)
    /// and whether the router itself was destroyed.
    pub fn leave(&self, channel_id: Uuid, user_id: Uuid) -> crate::router::RemovedMember {
        let removed = self.registry.lock().remove_member(channel_id, user_id);
        if removed.router_closed {
            self.workers.release_router(channel_id);
        }
        self.voice_state.leave(user_id);
        removed
    }

    pub async fn connect_transport(&self, channel_id: Uuid, transport_id: Uuid, dtls_parameters: Value) -> Result<()> {
        let worker_id = self.worker_for_channel(channel_id)?;
        self.worker_router
            .request(worker_id, "connectTransport", serde_json::json!({ "transport_id": transport_id, "dtls_parameters": dtls_parameters }))
            .await?;
        Ok(())
    }

    /// Creates the producer, then builds paused consumers for every other
    /// member already in the channel — the caller pushes `voice.new_consumer`
    /// to each returned recipient and the recipient resumes it with
    /// `voice.consumer_resume`.
    pub async fn produce(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        transport_id: Uuid,
        kind: MediaKind,
        rtp_parameters: Value,
        source: Option<String>,
    ) -> Result<(Uuid, Vec<(Uuid, NewConsumerInfo)>)> {
        let worker_id = self.worker_for_channel(channel_id)?;
        let producer_id = Uuid::now_v7();
        self.worker_router
            .request(
                worker_id,
                "produce",
                serde_json::json!({ "transport_id": transport_id, "producer_id": producer_id, "rtp_parameters": rtp_parameters }),
            )
            .await?;

        let recipients = {
            let mut registry = self.registry.lock();
            registry.register_producer(Producer { id: producer_id, transport_id, channel_id, user_id, kind, source: source.clone(), paused: false });
            registry.members_in_channel(channel_id).into_iter().filter(|id| *id != user_id).collect::<Vec<_>>()
        };

        let mut fan_out = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let recv_transport_id = self.registry.lock().recv_transport_for(channel_id, recipient);
            let Some(recv_transport_id) = recv_transport_id else { continue };
            let consumer_params = self
                .worker_router
                .request(
                    worker_id,
                    "createConsumer",
                    serde_json::json!({ "transport_id": recv_transport_id, "producer_id": producer_id, "paused": true }),
                )
                .await?;
            let consumer_id = Uuid::now_v7();
            self.registry.lock().register_consumer(Consumer {
                id: consumer_id,
                transport_id: recv_transport_id,
                producer_id,
                channel_id,
                user_id: recipient,
                rtp_parameters: consumer_params.clone(),
                paused: true,
            });
            fan_out.push((
                recipient,
                NewConsumerInfo { consumer_id, producer_id, user_id, kind, rtp_parameters: consumer_params, source: source.clone() },
            ));
        }

        Ok((producer_id, fan_out))
    }

    pub fn produce_stop(&self, producer_id: Uuid) -> Option<Producer> {
        self.registry.lock().remove_producer(producer_id)
    }

    pub async fn set_producer_paused(&self, channel_id: Uuid, producer_id: Uuid, paused: bool) -> Result<()> {
        let worker_id = self.worker_for_channel(channel_id)?;
        self.worker_router
            .request(worker_id, if paused { "pauseProducer" } else { "resumeProducer" }, serde_json::json!({ "producer_id": producer_id }))
            .await?;
        if let Some(producer) = self.registry.lock().producer_mut(producer_id) {
            producer.paused = paused;
        }
        Ok(())
    }

    /// Pauses or resumes every audio producer `user_id` owns in `channel_id`
    /// and records the new self-mute flag. A no-op (not an error) if the
    /// user currently has no audio producer there.
    pub async fn set_self_mute(&self, channel_id: Uuid, user_id: Uuid, muted: bool) -> Result<()> {
        let producer_ids = self.registry.lock().user_audio_producer_ids(channel_id, user_id);
        let worker_id = self.worker_for_channel(channel_id)?;
        for producer_id in producer_ids {
            self.worker_router
                .request(worker_id, if muted { "pauseProducer" } else { "resumeProducer" }, serde_json::json!({ "producer_id": producer_id }))
                .await?;
            if let Some(producer) = self.registry.lock().producer_mut(producer_id) {
                producer.paused = muted;
            }
        }
        self.voice_state.set_mute(user_id, muted);
        Ok(())
    }

    pub async fn consumer_resume(&self, channel_id: Uuid, consumer_id: Uuid) -> Result<()> {
        let worker_id = self.worker_for_channel(channel_id)?;
        self.worker_router.request(worker_id, "resumeConsumer", serde_json::json!({ "consumer_id": consumer_id })).await?;
        if let Some(consumer) = self.registry.lock().consumer_mut(consumer_id) {
            consumer.paused = false;
        }
        Ok(())
    }

    pub async fn set_quality(&self, channel_id: Uuid, consumer_id: Uuid, spatial_layer: Option<u8>, temporal_layer: Option<u8>) -> Result<()> {
        let worker_id = self.worker_for_channel(channel_id)?;
        self.worker_router
            .request(
                worker_id,
                "setConsumerPreferredLayers",
                serde_json::json!({ "consumer_id": consumer_id, "spatial_layer": spatial_layer, "temporal_layer": temporal_layer }),
            )
            .await?;
        Ok(())
    }

    fn worker_for_channel(&self, channel_id: Uuid) -> Result<crate::worker::WorkerId> {
        self.registry.lock().router_worker(channel_id).ok_or_else(|| EctoError::Voice {
            code: ecto_domain::error::codes::VOICE_ROUTER_UNAVAILABLE,
            message: "no router for this channel".into(),
        })
    }

    /// Forwards a reply from the media worker process to the pending
    /// `WorkerRouter::request` call it answers. The coordinator owns the
    /// only `WorkerRouter` instance, so whatever drives the worker side of
    /// the outbound channel needs this to complete the round trip.
    pub fn resolve_worker_reply(&self, reply: crate::worker_channel::WorkerReply) {
        self.worker_router.resolve(reply);
    }
}
