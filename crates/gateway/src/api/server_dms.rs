//! `serverDms` router: direct messages between two members of this tenant
//! server. Named for the wire routes (`/server-dms/...`) — DM content lives
//! in the same `messages` table as channel messages, keyed by conversation
//! id instead of channel id.

use axum::extract::{Path, Query, State};
use axum::Json;
use ecto_domain::entities::{DmConversation, Message, ReactionAction};
use ecto_domain::EctoError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::Authenticated;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MAX_CONTENT_LEN: usize = 4000;

pub async fn list_conversations(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
) -> ApiResult<Json<Vec<DmConversation>>> {
    Ok(Json(ecto_db::repo::dms::list_for_user(&state.db, state.server_id, member.user_id).await?))
}

async fn require_dms_open(state: &AppState, a: Uuid, b: Uuid) -> ApiResult<()> {
    if a == b {
        return Err(EctoError::validation(ecto_domain::error::codes::DM_SELF, "cannot open a DM with yourself").into());
    }
    let config = ecto_db::repo::servers::get_config(&state.db, state.server_id).await?;
    if !config.allow_member_dms {
        return Err(EctoError::Forbidden.into());
    }
    let peer = ecto_db::repo::members::get(&state.db, state.server_id, b).await.map_err(|_| {
        ApiError(EctoError::not_found(ecto_domain::error::codes::USER_NOT_FOUND, "not a member of this server"))
    })?;
    if !peer.allow_dms {
        return Err(EctoError::validation(ecto_domain::error::codes::DM_DMS_DISABLED, "this member has DMs disabled").into());
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct OpenConversationBody {
    pub user_id: Uuid,
}

pub async fn open_conversation(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<OpenConversationBody>,
) -> ApiResult<Json<DmConversation>> {
    require_dms_open(&state, member.user_id, body.user_id).await?;
    let conversation = ecto_db::repo::dms::open(&state.db, state.server_id, member.user_id, body.user_id).await?;
    Ok(Json(conversation))
}

async fn require_participant(state: &AppState, conversation_id: Uuid, user_id: Uuid) -> ApiResult<DmConversation> {
    let conversation = ecto_db::repo::dms::get(&state.db, conversation_id).await?;
    if conversation.user_a != user_id && conversation.user_b != user_id {
        return Err(EctoError::not_found(ecto_domain::error::codes::DM_NOT_A_RECIPIENT, "not a participant in this conversation").into());
    }
    Ok(conversation)
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub before: Option<Uuid>,
    pub limit: Option<i64>,
}

pub async fn history(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    require_participant(&state, conversation_id, member.user_id).await?;
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    Ok(Json(ecto_db::repo::dms::history(&state.db, conversation_id, query.before, limit).await?))
}

#[derive(Deserialize)]
pub struct SendDmBody {
    pub content: String,
    #[serde(default)]
    pub attachment_ids: Vec<Uuid>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SendDmBody>,
) -> ApiResult<Json<Message>> {
    let conversation = require_participant(&state, conversation_id, member.user_id).await?;
    if body.content.trim().is_empty() || body.content.len() > MAX_CONTENT_LEN {
        return Err(EctoError::validation(ecto_domain::error::codes::DM_CONTENT_INVALID, "content must be 1-4000 characters").into());
    }
    let message = ecto_db::repo::dms::send(&state.db, conversation_id, member.user_id, &body.content).await?;
    ecto_db::repo::messages::bind_attachments(&state.db, message.id, &body.attachment_ids).await?;
    let peer = conversation.other(member.user_id);
    state.sessions.dispatch_to_user(peer, "server_dm.message_create", json!(message));
    state.sessions.dispatch_to_user(member.user_id, "server_dm.message_create", json!(message));
    Ok(Json(message))
}

#[derive(Deserialize)]
pub struct EditDmBody {
    pub content: String,
}

pub async fn edit_message(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<EditDmBody>,
) -> ApiResult<Json<Message>> {
    let conversation = require_participant(&state, conversation_id, member.user_id).await?;
    if body.content.trim().is_empty() || body.content.len() > MAX_CONTENT_LEN {
        return Err(EctoError::validation(ecto_domain::error::codes::DM_CONTENT_INVALID, "content must be 1-4000 characters").into());
    }
    let existing = ecto_db::repo::messages::get(&state.db, message_id).await?;
    if existing.author_id != member.user_id {
        return Err(EctoError::Forbidden.into());
    }
    let message = ecto_db::repo::dms::edit(&state.db, message_id, &body.content).await?;
    let peer = conversation.other(member.user_id);
    state.sessions.dispatch_to_user(peer, "server_dm.message_update", json!(message));
    state.sessions.dispatch_to_user(member.user_id, "server_dm.message_update", json!(message));
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let conversation = require_participant(&state, conversation_id, member.user_id).await?;
    let existing = ecto_db::repo::messages::get(&state.db, message_id).await?;
    if existing.author_id != member.user_id {
        return Err(EctoError::Forbidden.into());
    }
    ecto_db::repo::dms::delete(&state.db, message_id).await?;
    let peer = conversation.other(member.user_id);
    state.sessions.dispatch_to_user(peer, "server_dm.message_delete", json!({ "id": message_id }));
    state.sessions.dispatch_to_user(member.user_id, "server_dm.message_delete", json!({ "id": message_id }));
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ReactDmBody {
    pub emoji: String,
    #[serde(default)]
    pub remove: bool,
}

pub async fn react_message(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((conversation_id, message_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ReactDmBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let conversation = require_participant(&state, conversation_id, member.user_id).await?;
    let action = if body.remove { ReactionAction::Remove } else { ReactionAction::Add };
    ecto_db::repo::dms::react(&state.db, message_id, member.user_id, &body.emoji, action).await?;
    let peer = conversation.other(member.user_id);
    let payload = json!({ "message_id": message_id, "user_id": member.user_id, "emoji": body.emoji, "removed": body.remove });
    state.sessions.dispatch_to_user(peer, "server_dm.reaction_update", payload.clone());
    state.sessions.dispatch_to_user(member.user_id, "server_dm.reaction_update", payload);
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct MarkDmReadBody {
    pub last_read_message_id: Uuid,
}

pub async fn mark_read(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<MarkDmReadBody>,
) -> ApiResult<Json<serde_json::Value>> {
    require_participant(&state, conversation_id, member.user_id).await?;
    ecto_db::repo::dms::mark_read(&state.db, member.user_id, conversation_id, body.last_read_message_id).await?;
    Ok(Json(json!({ "ok": true })))
}
