//! Translates `voice.*` client frames into [`ecto_voice::VoiceCoordinator`]
//! calls and pushes back the matching server messages. Only one of these
//! runs at a time per session, since frames are read one at a time off the
//! same connection.

use ecto_domain::entities::Member;
use ecto_domain::permissions::Permission;
use ecto_domain::{EctoError, Result};
use ecto_protocol::{VoiceClientMessage, VoiceServerMessage};
use ecto_voice::MediaKind;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::perm;
use crate::state::AppState;

pub async fn handle(state: &AppState, session_id: Uuid, member: &Member, event: &str, data: Value) {
    let parsed: std::result::Result<VoiceClientMessage, _> = serde_json::from_value(json!({ "event": event, "data": data }));
    let message = match parsed {
        Ok(m) => m,
        Err(_) => {
            super::reply_error(state, session_id, &EctoError::validation(ecto_domain::error::codes::VALIDATION, "invalid voice payload"));
            return;
        }
    };

    if let Err(e) = dispatch(state, session_id, member, message).await {
        super::reply_error(state, session_id, &e);
    }
}

async fn dispatch(state: &AppState, session_id: Uuid, member: &Member, message: VoiceClientMessage) -> Result<()> {
    match message {
        VoiceClientMessage::Join { channel_id } => join(state, session_id, member, channel_id).await,
        VoiceClientMessage::Leave => leave(state, member, current_channel(state, member.user_id)?),
        VoiceClientMessage::ConnectTransport { transport_id, dtls_parameters } => {
            let channel_id = current_channel(state, member.user_id)?;
            state.voice.connect_transport(channel_id, parse_uuid(&transport_id)?, dtls_parameters).await
        }
        VoiceClientMessage::Produce { transport_id, kind, rtp_parameters, source } => {
            produce(state, session_id, member, &transport_id, &kind, rtp_parameters, source).await
        }
        VoiceClientMessage::ProduceStop { producer_id } => produce_stop(state, member, &producer_id),
        VoiceClientMessage::ProducerPause { producer_id } => {
            let channel_id = current_channel(state, member.user_id)?;
            state.voice.set_producer_paused(channel_id, parse_uuid(&producer_id)?, true).await
        }
        VoiceClientMessage::ProducerResume { producer_id } => {
            let channel_id = current_channel(state, member.user_id)?;
            state.voice.set_producer_paused(channel_id, parse_uuid(&producer_id)?, false).await
        }
        VoiceClientMessage::ConsumerResume { consumer_id } => {
            let channel_id = current_channel(state, member.user_id)?;
            state.voice.consumer_resume(channel_id, parse_uuid(&consumer_id)?).await
        }
        VoiceClientMessage::Mute { self_mute, self_deaf } => mute(state, member, self_mute, self_deaf).await,
        VoiceClientMessage::SetQuality { consumer_id, spatial_layer, temporal_layer } => {
            let channel_id = current_channel(state, member.user_id)?;
            state.voice.set_quality(channel_id, parse_uuid(&consumer_id)?, spatial_layer, temporal_layer).await
        }
    }
}

async fn join(state: &AppState, session_id: Uuid, member: &Member, channel_id: Uuid) -> Result<()> {
    let channel = ecto_db::repo::channels::get(&state.db, channel_id).await?;
    if channel.kind != ecto_domain::entities::ChannelType::Voice {
        return Err(EctoError::validation(ecto_domain::error::codes::WRONG_CHANNEL_TYPE, "not a voice channel"));
    }
    perm::require_channel(state, member.user_id, channel_id, Permission::CONNECT_VOICE).await?;

    if let Some(current) = state.voice.voice_state.get(member.user_id) {
        if current.channel_id != channel_id {
            leave(state, member, current.channel_id)?;
        }
    }

    let result = state.voice.join(channel_id, member.user_id).await?;

    state.sessions.send(session_id, frame(VoiceServerMessage::RouterCapabilities { rtp_capabilities: result.router_capabilities }));
    state.sessions.send(
        session_id,
        frame(VoiceServerMessage::TransportCreated {
            send: json!({ "id": result.send_transport_id, "params": result.send_transport_params }),
            recv: json!({ "id": result.recv_transport_id, "params": result.recv_transport_params }),
        }),
    );
    for consumer in result.existing_producers {
        state.sessions.send(
            session_id,
            frame(VoiceServerMessage::NewConsumer {
                consumer_id: consumer.consumer_id.to_string(),
                producer_id: consumer.producer_id.to_string(),
                user_id: consumer.user_id,
                kind: kind_str(consumer.kind),
                rtp_parameters: consumer.rtp_parameters,
                source: consumer.source,
            }),
        );
    }

    state.sessions.dispatch_to_server(
        state.server_id,
        "voice.state_update",
        json!({ "user_id": member.user_id, "channel_id": channel_id, "self_mute": false, "self_deaf": false }),
    );
    Ok(())
}

fn leave(state: &AppState, member: &Member, channel_id: Uuid) -> Result<()> {
    let removed = state.voice.leave(channel_id, member.user_id);
    for producer_id in removed.producers {
        state.sessions.dispatch_to_channel(channel_id, "voice.producer_closed", json!({ "producer_id": producer_id }));
    }
    state.sessions.dispatch_to_server(
        state.server_id,
        "voice.state_update",
        json!({ "user_id": member.user_id, "channel_id": Value::Null, "self_mute": false, "self_deaf": false, "_removed": true }),
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn produce(
    state: &AppState,
    session_id: Uuid,
    member: &Member,
    transport_id: &str,
    kind: &str,
    rtp_parameters: Value,
    source: Option<String>,
) -> Result<()> {
    let channel_id = current_channel(state, member.user_id)?;
    let transport_id = parse_uuid(transport_id)?;
    let kind = parse_kind(kind)?;
    let (producer_id, fan_out) = state.voice.produce(channel_id, member.user_id, transport_id, kind, rtp_parameters, source).await?;

    state.sessions.send(session_id, frame(VoiceServerMessage::Produced { producer_id: producer_id.to_string() }));
    for (recipient, consumer) in fan_out {
        state.sessions.dispatch_to_user(
            recipient,
            "voice.new_consumer",
            json!({
                "consumer_id": consumer.consumer_id,
                "producer_id": consumer.producer_id,
                "user_id": consumer.user_id,
                "kind": kind_str(consumer.kind),
                "rtp_parameters": consumer.rtp_parameters,
                "source": consumer.source,
            }),
        );
    }
    Ok(())
}

fn produce_stop(state: &AppState, member: &Member, producer_id: &str) -> Result<()> {
    let channel_id = current_channel(state, member.user_id)?;
    let producer_id = parse_uuid(producer_id)?;
    if let Some(producer) = state.voice.produce_stop(producer_id) {
        state.sessions.dispatch_to_channel(channel_id, "voice.producer_closed", json!({ "producer_id": producer.id }));
    }
    Ok(())
}

async fn mute(state: &AppState, member: &Member, self_mute: Option<bool>, self_deaf: Option<bool>) -> Result<()> {
    let channel_id = current_channel(state, member.user_id)?;
    if let Some(muted) = self_mute {
        state.voice.set_self_mute(channel_id, member.user_id, muted).await?;
    }
    if let Some(deaf) = self_deaf {
        state.voice.voice_state.set_self_deaf(member.user_id, deaf);
    }
    let current = state.voice.voice_state.get(member.user_id).ok_or_else(|| EctoError::Voice {
        code: ecto_domain::error::codes::VOICE_NOT_VOICE_CHANNEL,
        message: "not connected to voice".into(),
    })?;
    state.sessions.dispatch_to_server(
        state.server_id,
        "voice.state_update",
        json!({ "user_id": member.user_id, "channel_id": current.channel_id, "self_mute": current.self_mute, "self_deaf": current.self_deaf }),
    );
    Ok(())
}

fn current_channel(state: &AppState, user_id: Uuid) -> Result<Uuid> {
    state
        .voice
        .voice_state
        .get(user_id)
        .map(|s| s.channel_id)
        .ok_or_else(|| EctoError::Voice { code: ecto_domain::error::codes::VOICE_NOT_VOICE_CHANNEL, message: "not connected to voice".into() })
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| EctoError::validation(ecto_domain::error::codes::VALIDATION, "invalid id"))
}

fn parse_kind(s: &str) -> Result<MediaKind> {
    match s {
        "audio" => Ok(MediaKind::Audio),
        "video" => Ok(MediaKind::Video),
        _ => Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "invalid media kind")),
    }
}

fn kind_str(kind: MediaKind) -> String {
    match kind {
        MediaKind::Audio => "audio".into(),
        MediaKind::Video => "video".into(),
    }
}

fn frame(message: VoiceServerMessage) -> ecto_protocol::Frame {
    let value = serde_json::to_value(message).unwrap_or(Value::Null);
    let event = value.get("event").and_then(Value::as_str).unwrap_or_default().to_string();
    let data = value.get("data").cloned().unwrap_or(Value::Null);
    ecto_protocol::Frame::new(event, data)
}
