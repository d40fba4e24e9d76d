//! `invites` router: create/list/revoke server invites, and the join-via-
//! invite endpoint — the one mutation that runs before the caller is a
//! member, so it authenticates by bearer token directly rather than through
//! the [`Authenticated`] extractor (which requires an existing `Member` row).

use axum::extract::{Path, State};
use axum::http::header;
use axum::Json;
use ecto_domain::entities::Invite;
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::Deserialize;
use serde_json::json;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn list_invites(State(state): State<AppState>, Authenticated(member): Authenticated) -> ApiResult<Json<Vec<Invite>>> {
    perm::require_server(&state, member.user_id, Permission::CREATE_INVITES).await?;
    Ok(Json(ecto_db::repo::invites::list(&state.db, state.server_id).await?))
}

#[derive(Deserialize)]
pub struct CreateInviteBody {
    #[serde(default)]
    pub max_uses: i32,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn create_invite(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<CreateInviteBody>,
) -> ApiResult<Json<Invite>> {
    perm::require_server(&state, member.user_id, Permission::CREATE_INVITES).await?;
    let invite = ecto_db::repo::invites::create(&state.db, state.server_id, member.user_id, body.max_uses, body.expires_at).await?;
    Ok(Json(invite))
}

pub async fn revoke_invite(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(code): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::CREATE_INVITES).await?;
    ecto_db::repo::invites::revoke(&state.db, &code).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn redeem_invite(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Path(code): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError(EctoError::Auth("missing bearer token".into())))?;
    let identity = crate::auth::verify_token(&state, token).await?;

    let invite = ecto_db::repo::invites::get(&state.db, &code).await?;
    if invite.server_id != state.server_id || !invite.is_usable(chrono::Utc::now()) {
        return Err(EctoError::not_found(ecto_domain::error::codes::INVITE_INVALID, "invite is no longer valid").into());
    }

    if ecto_db::repo::members::get(&state.db, state.server_id, identity.user_id).await.is_ok() {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "already a member").into());
    }
    if ecto_db::repo::bans::get(&state.db, state.server_id, identity.user_id).await?.is_some() {
        return Err(EctoError::Forbidden.into());
    }

    let member = ecto_db::repo::members::join(&state.db, state.server_id, identity.user_id, identity.identity_type, state.default_role_id).await?;
    ecto_db::repo::invites::increment_use(&state.db, &code).await?;

    state.sessions.dispatch_to_server(state.server_id, "member.add", json!(member));
    Ok(Json(json!({ "member": member })))
}
