//! `webhooks` router: management CRUD (gated on `MANAGE_WEBHOOKS`) plus the
//! public bearer posting endpoint, which authenticates solely on the
//! `(id, token)` pair in the URL — no `Authorization` header, since the
//! caller isn't a member at all.

use axum::extract::{Path, State};
use axum::Json;
use ecto_domain::entities::{Message, MessageType, Webhook};
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

pub async fn list_webhooks(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Webhook>>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::MANAGE_WEBHOOKS).await?;
    Ok(Json(ecto_db::repo::webhooks::list_for_channel(&state.db, channel_id).await?))
}

#[derive(Deserialize)]
pub struct CreateWebhookBody {
    pub name: String,
}

pub async fn create_webhook(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<CreateWebhookBody>,
) -> ApiResult<Json<Webhook>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::MANAGE_WEBHOOKS).await?;
    if body.name.trim().is_empty() {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "name must not be empty").into());
    }
    let webhook = ecto_db::repo::webhooks::create(&state.db, state.server_id, channel_id, &body.name, member.user_id).await?;
    Ok(Json(webhook))
}

pub async fn regenerate_token(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((channel_id, webhook_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Webhook>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::MANAGE_WEBHOOKS).await?;
    Ok(Json(ecto_db::repo::webhooks::regenerate_token(&state.db, webhook_id).await?))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((channel_id, webhook_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::MANAGE_WEBHOOKS).await?;
    ecto_db::repo::webhooks::delete(&state.db, webhook_id).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct PostWebhookBody {
    pub content: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

/// `POST /webhooks/{id}/{token}`, no bearer auth. The caller impersonates
/// the webhook's own identity (`created_by`) with an optional display
/// override, just like the real platform this imitates.
pub async fn post_webhook_message(
    State(state): State<AppState>,
    Path((webhook_id, token)): Path<(Uuid, String)>,
    Json(body): Json<PostWebhookBody>,
) -> ApiResult<Json<Message>> {
    let webhook = ecto_db::repo::webhooks::get(&state.db, webhook_id).await.map_err(|_| EctoError::Auth("invalid webhook credentials".into()))?;
    if !bool::from(subtle::ConstantTimeEq::ct_eq(webhook.token.as_bytes(), token.as_bytes())) {
        return Err(EctoError::Auth("invalid webhook credentials".into()).into());
    }

    let content = body.content.trim();
    if content.is_empty() || content.len() > MAX_CONTENT_LEN {
        return Err(EctoError::validation(ecto_domain::error::codes::CONTENT_INVALID, "content must be 1-4000 characters").into());
    }

    let message = ecto_db::repo::messages::create(
        &state.db,
        webhook.channel_id,
        webhook.created_by,
        Some(content),
        MessageType::Default,
        None,
        false,
        &[],
        &[],
        Some(webhook.id),
    )
    .await?;

    state.sessions.dispatch_to_channel(
        webhook.channel_id,
        "message.create",
        json!({
            "message": message,
            "webhook": { "id": webhook.id, "name": body.username.unwrap_or(webhook.name), "avatar_url": body.avatar_url.or(webhook.avatar_url) },
        }),
    );
    Ok(Json(message))
}
