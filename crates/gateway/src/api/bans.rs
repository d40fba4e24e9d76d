//! `bans` router: ban/unban a user id (independent of current membership —
//! a banned user need not be a member at the time they're banned).

use axum::extract::{Path, State};
use axum::Json;
use ecto_domain::entities::{Ban, DeleteMessagesWindow};
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_bans(State(state): State<AppState>, Authenticated(member): Authenticated) -> ApiResult<Json<Vec<Ban>>> {
    perm::require_server(&state, member.user_id, Permission::BAN_MEMBERS).await?;
    Ok(Json(ecto_db::repo::bans::list(&state.db, state.server_id).await?))
}

#[derive(Deserialize)]
pub struct CreateBanBody {
    pub reason: Option<String>,
    pub delete_messages: Option<DeleteMessagesWindow>,
}

pub async fn create_ban(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(user_id): Path<Uuid>,
    Json(body): Json<CreateBanBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if user_id == member.user_id {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "cannot ban yourself").into());
    }
    perm::require_server(&state, member.user_id, Permission::BAN_MEMBERS).await?;

    if let Ok(target) = ecto_db::repo::members::get(&state.db, state.server_id, user_id).await {
        let is_owner = ecto_db::repo::servers::get(&state.db, state.server_id).await?.admin_user_id == member.user_id;
        perm::require_outranks(&state, is_owner, member.user_id, target.id).await?;
    }

    let mut tx = state.db.begin().await.map_err(EctoError::database)?;
    ecto_db::repo::bans::create(&mut tx, state.server_id, user_id, member.user_id, body.reason.as_deref(), body.delete_messages).await?;
    let _ = ecto_db::repo::members::leave_tx(&mut tx, state.server_id, user_id).await;
    ecto_db::repo::audit::record(
        &mut tx,
        state.server_id,
        member.user_id,
        "member.ban",
        Some("member"),
        Some(user_id),
        json!({ "reason": body.reason }),
    )
    .await?;
    tx.commit().await.map_err(EctoError::database)?;

    state.sessions.dispatch_to_server(state.server_id, "member.leave", json!({ "user_id": user_id, "reason": "banned" }));
    state.sessions.dispatch_to_user(user_id, "member.banned", json!({ "server_id": state.server_id }));
    state.sessions.force_close_user(user_id, "Banned");
    Ok(Json(json!({ "ok": true })))
}

pub async fn delete_ban(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::BAN_MEMBERS).await?;
    ecto_db::repo::bans::delete(&state.db, state.server_id, user_id).await?;

    let mut tx = state.db.begin().await.map_err(EctoError::database)?;
    ecto_db::repo::audit::record(&mut tx, state.server_id, member.user_id, "member.unban", Some("member"), Some(user_id), json!({})).await?;
    tx.commit().await.map_err(EctoError::database)?;

    state.sessions.dispatch_to_server(state.server_id, "ban.remove", json!({ "user_id": user_id }));
    Ok(Json(json!({ "ok": true })))
}
