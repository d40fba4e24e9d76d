//! `members` router: roster listing, nickname/self-profile updates, role
//! assignment, and the kick operation (ban lives in `bans.rs`, since it also
//! covers users who were never members).

use axum::extract::{Path, State};
use axum::Json;
use ecto_domain::entities::Member;
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

const LIST_CAP: i64 = 1000;

pub async fn list_members(State(state): State<AppState>, Authenticated(_member): Authenticated) -> ApiResult<Json<Vec<Member>>> {
    Ok(Json(ecto_db::repo::members::list_for_server(&state.db, state.server_id, LIST_CAP).await?))
}

pub async fn get_member(
    State(state): State<AppState>,
    Authenticated(_member): Authenticated,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Member>> {
    Ok(Json(ecto_db::repo::members::get(&state.db, state.server_id, user_id).await?))
}

#[derive(Deserialize)]
pub struct UpdateNicknameBody {
    pub nickname: Option<String>,
}

/// A member may always rename themself; renaming someone else requires
/// `MANAGE_ROLES` server-wide (there's no dedicated nickname-management bit
/// in the permission set).
pub async fn update_nickname(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateNicknameBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let target = ecto_db::repo::members::get(&state.db, state.server_id, user_id).await?;
    if user_id != member.user_id {
        perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    }
    ecto_db::repo::members::update_nickname(&state.db, target.id, body.nickname.as_deref()).await?;
    state.sessions.dispatch_to_server(
        state.server_id,
        "member.update",
        json!({ "user_id": user_id, "nickname": body.nickname }),
    );
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct SetRolesBody {
    pub role_ids: Vec<Uuid>,
}

pub async fn set_roles(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SetRolesBody>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    let target = ecto_db::repo::members::get(&state.db, state.server_id, user_id).await?;
    let is_owner = ecto_db::repo::servers::get(&state.db, state.server_id).await?.admin_user_id == member.user_id;
    perm::require_outranks(&state, is_owner, member.user_id, target.id).await?;

    ecto_db::repo::members::set_roles(&state.db, target.id, state.default_role_id, &body.role_ids).await?;
    ecto_db::repo::members::bump_token_version(&state.db, target.id).await?;
    state.sessions.dispatch_to_server(
        state.server_id,
        "member.roles_update",
        json!({ "user_id": user_id, "role_ids": body.role_ids }),
    );
    Ok(Json(json!({ "ok": true })))
}

pub async fn kick_member(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if user_id == member.user_id {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "cannot kick yourself").into());
    }
    perm::require_server(&state, member.user_id, Permission::KICK_MEMBERS).await?;
    let target = ecto_db::repo::members::get(&state.db, state.server_id, user_id).await?;
    let is_owner = ecto_db::repo::servers::get(&state.db, state.server_id).await?.admin_user_id == member.user_id;
    perm::require_outranks(&state, is_owner, member.user_id, target.id).await?;

    let mut tx = state.db.begin().await.map_err(EctoError::database)?;
    ecto_db::repo::members::leave_tx(&mut tx, state.server_id, user_id).await?;
    ecto_db::repo::audit::record(&mut tx, state.server_id, member.user_id, "member.kick", Some("member"), Some(user_id), json!({})).await?;
    tx.commit().await.map_err(EctoError::database)?;

    state.sessions.dispatch_to_server(state.server_id, "member.leave", json!({ "user_id": user_id, "reason": "kicked" }));
    state.sessions.dispatch_to_user(user_id, "member.kicked", json!({ "server_id": state.server_id }));
    state.sessions.force_close_user(user_id, "Kicked");
    Ok(Json(json!({ "ok": true })))
}
