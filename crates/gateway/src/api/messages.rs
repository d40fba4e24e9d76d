//! `messages` router: send/update/delete/pin/react/list within a text
//! channel. DM equivalents live in `server_dms.rs` — they share the
//! `messages` table but a different identity/permission model.

use axum::extract::{Path, Query, State};
use axum::Json;
use ecto_domain::entities::{Attachment, Channel, ChannelType, Message, MessageType, ReactionAction};
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

const MAX_CONTENT_LEN: usize = 4000;

async fn require_text_channel(state: &AppState, channel_id: Uuid) -> ApiResult<Channel> {
    let channel = ecto_db::repo::channels::get(&state.db, channel_id).await?;
    if channel.kind == ChannelType::Page {
        return Err(EctoError::validation(ecto_domain::error::codes::WRONG_CHANNEL_TYPE, "page channels don't take messages").into());
    }
    Ok(channel)
}

#[derive(Deserialize)]
pub struct SendMessageBody {
    pub content: Option<String>,
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub attachment_ids: Vec<Uuid>,
}

pub async fn send(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<SendMessageBody>,
) -> ApiResult<Json<Message>> {
    let channel = require_text_channel(&state, channel_id).await?;
    let needed = if body.attachment_ids.is_empty() { Permission::SEND_MESSAGES } else { Permission::SEND_MESSAGES | Permission::ATTACH_FILES };
    let mask = perm::require_channel(&state, member.user_id, channel_id, needed).await?;
    state.mutation_limiter.check(&format!("messages:{}", member.user_id)).map_err(EctoError::from)?;

    let content = body.content.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if content.is_none() && body.attachment_ids.is_empty() {
        return Err(EctoError::validation(ecto_domain::error::codes::CONTENT_INVALID, "message must have content or at least one attachment").into());
    }
    if let Some(c) = content {
        if c.len() > MAX_CONTENT_LEN {
            return Err(EctoError::validation(ecto_domain::error::codes::CONTENT_INVALID, "content must be at most 4000 characters").into());
        }
    }

    if channel.slowmode_seconds > 0 && !mask.has(Permission::MANAGE_MESSAGES) && !mask.has(Permission::MANAGE_CHANNELS) {
        if let Some(last) = ecto_db::repo::messages::last_by_author(&state.db, channel_id, member.user_id).await? {
            let elapsed = (chrono::Utc::now() - last.created_at).num_seconds();
            if elapsed < channel.slowmode_seconds as i64 {
                return Err(EctoError::RateLimited { retry_after: (channel.slowmode_seconds as i64 - elapsed).max(1) as u64 }.into());
            }
        }
    }

    let parsed = content.map(crate::mentions::parse).unwrap_or_default();
    let honor_mentions = mask.has(Permission::MENTION_EVERYONE);
    let mention_everyone = honor_mentions && parsed.mention_everyone;
    let mention_roles: Vec<Uuid> = if honor_mentions { parsed.roles.clone() } else { Vec::new() };
    let mention_users = parsed.users.clone();

    let message = ecto_db::repo::messages::create(
        &state.db,
        channel_id,
        member.user_id,
        content,
        MessageType::Default,
        body.reply_to,
        mention_everyone,
        &mention_roles,
        &mention_users,
        None,
    )
    .await?;
    ecto_db::repo::messages::bind_attachments(&state.db, message.id, &body.attachment_ids).await?;

    let mut notified: Vec<Uuid> = mention_users.clone();
    if !mention_roles.is_empty() {
        notified.extend(ecto_db::repo::members::list_user_ids_with_roles(&state.db, state.server_id, &mention_roles).await?);
    }
    if mention_everyone {
        notified.extend(ecto_db::repo::members::list_for_server(&state.db, state.server_id, 1000).await?.into_iter().map(|m| m.user_id));
    }
    notified.sort();
    notified.dedup();
    notified.retain(|u| *u != member.user_id);

    if !notified.is_empty() {
        ecto_db::repo::read_state::bump_mentions(&state.db, channel_id, &notified).await?;
        for user_id in &notified {
            state.sessions.dispatch_to_user(*user_id, "mention.create", json!({ "channel_id": channel_id, "message_id": message.id }));
        }
        // `/notify` sessions only ever see the lightweight `notify` event
        // (filtered for elsewhere in `ws::run_session`), debounced to at
        // most one per channel every 2s regardless of how many mentions
        // landed in that window.
        if state.notify_limiter.check(&format!("notify:{channel_id}")).is_ok() {
            for user_id in &notified {
                state.sessions.dispatch_to_user(
                    *user_id,
                    "notify",
                    json!({ "channel_id": channel_id, "ts": chrono::Utc::now(), "type": "mention" }),
                );
            }
        }
    }

    state.sessions.dispatch_to_channel(channel_id, "message.create", json!(message));
    Ok(Json(message))
}

#[derive(Deserialize)]
pub struct UpdateMessageBody {
    pub content: String,
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateMessageBody>,
) -> ApiResult<Json<Message>> {
    let existing = ecto_db::repo::messages::get(&state.db, message_id).await?;
    if existing.author_id != member.user_id {
        return Err(EctoError::Forbidden.into());
    }
    let content = body.content.trim();
    if content.is_empty() || content.len() > MAX_CONTENT_LEN {
        return Err(EctoError::validation(ecto_domain::error::codes::CONTENT_INVALID, "content must be 1-4000 characters").into());
    }
    let message = ecto_db::repo::messages::update_content(&state.db, message_id, content).await?;
    state.sessions.dispatch_to_channel(channel_id, "message.update", json!(message));
    Ok(Json(message))
}

pub async fn delete(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let existing = ecto_db::repo::messages::get(&state.db, message_id).await?;
    let is_author = existing.author_id == member.user_id;
    if !is_author {
        perm::require_channel(&state, member.user_id, channel_id, Permission::MANAGE_MESSAGES).await?;
    }
    let mut tx = state.db.begin().await.map_err(EctoError::database)?;
    ecto_db::repo::messages::soft_delete_tx(&mut tx, message_id).await?;
    if !is_author {
        ecto_db::repo::audit::record(&mut tx, state.server_id, member.user_id, "message.delete", Some("message"), Some(message_id), json!({})).await?;
    }
    tx.commit().await.map_err(EctoError::database)?;

    state.sessions.dispatch_to_channel(channel_id, "message.delete", json!({ "id": message_id }));
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct PinMessageBody {
    pub pinned: bool,
}

pub async fn pin(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<PinMessageBody>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::MANAGE_MESSAGES).await?;
    ecto_db::repo::messages::set_pinned(&state.db, message_id, body.pinned).await?;
    state.sessions.dispatch_to_channel(channel_id, "message.update", json!({ "id": message_id, "pinned": body.pinned }));

    if body.pinned {
        let config = ecto_db::repo::servers::get_config(&state.db, state.server_id).await?;
        if config.show_system_messages {
            let system = ecto_db::repo::messages::create(
                &state.db,
                channel_id,
                member.user_id,
                None,
                MessageType::PinAdded,
                Some(message_id),
                false,
                &[],
                &[],
                None,
            )
            .await?;
            state.sessions.dispatch_to_channel(channel_id, "message.create", json!(system));
        }
    }
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ReactBody {
    pub emoji: String,
    #[serde(default)]
    pub remove: bool,
}

pub async fn react(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ReactBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let action = if body.remove { ReactionAction::Remove } else { ReactionAction::Add };
    if action == ReactionAction::Add {
        perm::require_channel(&state, member.user_id, channel_id, Permission::ADD_REACTIONS).await?;
    }
    let count = ecto_db::repo::messages::react(&state.db, message_id, member.user_id, &body.emoji, action).await?;
    state.sessions.dispatch_to_channel(
        channel_id,
        "message.reaction_update",
        json!({ "channel_id": channel_id, "message_id": message_id, "emoji": body.emoji, "user_id": member.user_id, "action": action, "count": count }),
    );
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ListMessagesQuery {
    pub before: Option<Uuid>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub pinned_only: bool,
}

pub async fn list(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::READ_MESSAGES).await?;
    let messages = if query.pinned_only {
        ecto_db::repo::messages::list_pinned(&state.db, channel_id).await?
    } else {
        let limit = query.limit.unwrap_or(50).clamp(1, 100);
        ecto_db::repo::messages::list_for_channel(&state.db, channel_id, query.before, limit).await?
    };
    Ok(Json(messages))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Attachment>>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::READ_MESSAGES).await?;
    Ok(Json(ecto_db::repo::messages::get_attachments_for_message(&state.db, message_id).await?))
}
