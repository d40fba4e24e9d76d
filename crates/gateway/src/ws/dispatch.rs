//! Runtime frame handling for an identified `/ws` session — everything
//! after the handshake in `ws::mod`. One frame at a time, matched on
//! `event`, so a single connection never processes two mutations
//! concurrently.

use ecto_domain::entities::Member;
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use ecto_protocol::{CloseCode, Frame, HEARTBEAT_TIMEOUT_SECS};
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::state::AppState;

pub enum Outcome {
    Continue,
    Close(CloseCode),
}

pub async fn handle(state: &AppState, session_id: Uuid, member: &Member, frame: Frame) -> Outcome {
    match frame.event.as_str() {
        "system.identify" => return Outcome::Close(CloseCode::AlreadyAuthenticated),

        "system.heartbeat" => {
            state.sessions.touch_heartbeat(session_id);
            state.sessions.send(session_id, Frame::new("system.heartbeat_ack", json!({})));
        }

        "system.resume" => handle_resume(state, session_id, frame),

        "subscribe" => handle_subscribe(state, session_id, member, frame, true).await,
        "unsubscribe" => handle_subscribe(state, session_id, member, frame, false).await,

        "typing.start" => handle_typing(state, member, frame, true).await,
        "typing.stop" => handle_typing(state, member, frame, false).await,

        "server_dm.typing" => handle_dm_typing(state, member, frame).await,

        "presence.update" => handle_presence_update(state, member, frame),

        event if event.starts_with("voice.") => {
            super::voice::handle(state, session_id, member, event, frame.data).await;
        }

        _ => super::reply_error(state, session_id, &EctoError::validation(ecto_domain::error::codes::VALIDATION, "unknown event")),
    }

    Outcome::Continue
}

/// `HEARTBEAT_TIMEOUT_SECS` of silence closes the connection; the caller
/// checks this before blocking on the next frame.
pub fn heartbeat_expired(last_heartbeat: chrono::DateTime<chrono::Utc>) -> bool {
    (chrono::Utc::now() - last_heartbeat).num_seconds() >= HEARTBEAT_TIMEOUT_SECS as i64
}

fn handle_resume(state: &AppState, new_session_id: Uuid, frame: Frame) {
    let Some(old_session_id) = frame.data.get("session_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) else {
        super::reply_error(state, new_session_id, &EctoError::validation(ecto_domain::error::codes::VALIDATION, "missing session_id"));
        return;
    };
    let last_seq = frame.data.get("last_seq").and_then(|v| v.as_u64()).unwrap_or(0);

    let replayed = state.sessions.resume(old_session_id, new_session_id, last_seq).unwrap_or_default();
    for event in &replayed {
        state.sessions.send(new_session_id, Frame::with_seq(event.event.clone(), event.data.clone(), event.seq));
    }
    state.sessions.send(new_session_id, Frame::new("system.resumed", json!({ "replayed": replayed.len() })));
}

async fn handle_subscribe(state: &AppState, session_id: Uuid, member: &Member, frame: Frame, subscribe: bool) {
    let Some(channel_id) = frame.data.get("channel_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) else {
        super::reply_error(state, session_id, &EctoError::validation(ecto_domain::error::codes::VALIDATION, "missing channel_id"));
        return;
    };

    if subscribe {
        if perm::require_channel(state, member.user_id, channel_id, Permission::READ_MESSAGES).await.is_err() {
            super::reply_error(state, session_id, &EctoError::Forbidden);
            return;
        }
        state.sessions.subscribe_channel(session_id, channel_id);
        state.sessions.send(session_id, Frame::new("subscribed", json!({ "channel_id": channel_id })));
    } else {
        state.sessions.unsubscribe_channel(session_id, channel_id);
        state.sessions.send(session_id, Frame::new("unsubscribed", json!({ "channel_id": channel_id })));
    }
}

async fn handle_typing(state: &AppState, member: &Member, frame: Frame, starting: bool) {
    let Some(channel_id) = frame.data.get("channel_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) else {
        return;
    };
    if perm::require_channel(state, member.user_id, channel_id, Permission::SEND_MESSAGES).await.is_err() {
        return;
    }
    let key = format!("typing:{}:{}", member.user_id, channel_id);
    if state.typing_limiter.check(&key).is_err() {
        return;
    }
    let event = if starting { "typing.start" } else { "typing.stop" };
    state.sessions.dispatch_to_channel(channel_id, event, json!({ "channel_id": channel_id, "user_id": member.user_id }));
}

async fn handle_dm_typing(state: &AppState, member: &Member, frame: Frame) {
    let Some(conversation_id) = frame.data.get("conversation_id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) else {
        return;
    };
    let Ok(conversation) = ecto_db::repo::dms::get(&state.db, conversation_id).await else {
        return;
    };
    if conversation.user_a != member.user_id && conversation.user_b != member.user_id {
        return;
    }
    let key = format!("typing:{}:{}", member.user_id, conversation_id);
    if state.typing_limiter.check(&key).is_err() {
        return;
    }
    let peer = if conversation.user_a == member.user_id { conversation.user_b } else { conversation.user_a };
    state.sessions.dispatch_to_user(
        peer,
        "server_dm.typing",
        json!({ "conversation_id": conversation_id, "user_id": member.user_id }),
    );
}

fn handle_presence_update(state: &AppState, member: &Member, frame: Frame) {
    let Some(status) = frame.data.get("status").and_then(|v| v.as_str()).and_then(parse_status) else {
        return;
    };
    let custom_text = frame.data.get("custom_text").and_then(|v| v.as_str()).map(str::to_owned);
    state.presence.set_online(member.user_id, status);
    state.sessions.dispatch_to_server(
        state.server_id,
        "presence.update",
        json!({ "user_id": member.user_id, "status": status, "custom_text": custom_text }),
    );
}

fn parse_status(s: &str) -> Option<ecto_realtime::PresenceStatus> {
    match s {
        "online" => Some(ecto_realtime::PresenceStatus::Online),
        "idle" => Some(ecto_realtime::PresenceStatus::Idle),
        "dnd" => Some(ecto_realtime::PresenceStatus::Dnd),
        "offline" => Some(ecto_realtime::PresenceStatus::Offline),
        _ => None,
    }
}

