//! `channels` router: CRUD, reordering, and the permission-override tables
//! that back category/channel-scoped allow/deny bits.

use axum::extract::{Path, State};
use axum::Json;
use ecto_domain::entities::{Channel, ChannelType, PermissionOverrideRow};
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_channels(State(state): State<AppState>, Authenticated(_member): Authenticated) -> ApiResult<Json<Vec<Channel>>> {
    Ok(Json(ecto_db::repo::channels::list_for_server(&state.db, state.server_id).await?))
}

pub async fn get_channel(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
) -> ApiResult<Json<Channel>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::READ_MESSAGES).await?;
    Ok(Json(ecto_db::repo::channels::get(&state.db, channel_id).await?))
}

#[derive(Deserialize)]
pub struct CreateChannelBody {
    pub name: String,
    pub kind: ChannelType,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub position: i32,
}

pub async fn create_channel(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<CreateChannelBody>,
) -> ApiResult<Json<Channel>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_CHANNELS).await?;
    if body.name.trim().is_empty() {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "name must not be empty").into());
    }
    let channel =
        ecto_db::repo::channels::create(&state.db, state.server_id, body.category_id, &body.name, body.kind, body.position).await?;
    if channel.kind == ChannelType::Page {
        ecto_db::repo::pages::create_empty(&state.db, channel.id).await?;
    }
    state.sessions.dispatch_to_server(state.server_id, "channel.create", json!(channel));
    Ok(Json(channel))
}

#[derive(Deserialize)]
pub struct UpdateChannelBody {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub slowmode_seconds: Option<i32>,
    pub nsfw: Option<bool>,
}

pub async fn update_channel(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<UpdateChannelBody>,
) -> ApiResult<Json<Channel>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_CHANNELS).await?;
    let channel = ecto_db::repo::channels::update(
        &state.db,
        channel_id,
        body.name.as_deref(),
        body.topic.as_deref(),
        body.slowmode_seconds,
        body.nsfw,
    )
    .await?;
    state.sessions.dispatch_to_server(state.server_id, "channel.update", json!(channel));
    Ok(Json(channel))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_CHANNELS).await?;
    ecto_db::repo::channels::delete(&state.db, channel_id).await?;
    state.sessions.dispatch_to_server(state.server_id, "channel.delete", json!({ "id": channel_id }));
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ReorderChannelsBody {
    pub ordered_ids: Vec<Uuid>,
}

pub async fn reorder_channels(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<ReorderChannelsBody>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_CHANNELS).await?;
    ecto_db::repo::channels::reorder(&state.db, &body.ordered_ids).await?;
    state.sessions.dispatch_to_server(state.server_id, "channel.reorder", json!({ "ordered_ids": body.ordered_ids }));
    Ok(Json(json!({ "ok": true })))
}

// ── Permission overrides ─────────────────────────────────────────────────

pub async fn list_overrides(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PermissionOverrideRow>>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    Ok(Json(ecto_db::repo::channels::list_overrides(&state.db, channel_id).await?))
}

#[derive(Deserialize)]
pub struct UpsertOverrideBody {
    pub target_type: String,
    pub target_id: Uuid,
    #[serde(default)]
    pub allow: i64,
    #[serde(default)]
    pub deny: i64,
}

pub async fn upsert_override(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<UpsertOverrideBody>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    if body.target_type != "role" && body.target_type != "member" {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "target_type must be role or member").into());
    }
    ecto_db::repo::channels::upsert_override(&state.db, channel_id, &body.target_type, body.target_id, body.allow, body.deny).await?;
    state.sessions.dispatch_to_server(
        state.server_id,
        "channel.override_update",
        json!({ "channel_id": channel_id, "target_type": body.target_type, "target_id": body.target_id, "allow": body.allow, "deny": body.deny }),
    );
    Ok(Json(json!({ "ok": true })))
}

pub async fn delete_override(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((channel_id, target_type, target_id)): Path<(Uuid, String, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    ecto_db::repo::channels::delete_override(&state.db, channel_id, &target_type, target_id).await?;
    state.sessions.dispatch_to_server(
        state.server_id,
        "channel.override_delete",
        json!({ "channel_id": channel_id, "target_type": target_type, "target_id": target_id }),
    );
    Ok(Json(json!({ "ok": true })))
}
