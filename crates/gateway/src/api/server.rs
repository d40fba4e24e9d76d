//! `server` and `serverConfig` routers, plus `categories` (grouped here
//! since both are server-wide, low-cardinality resources).

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use ecto_domain::entities::{Category, IdentityType, Server, ServerConfig};
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::{Authenticated, VerifiedIdentity};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn get_server(State(state): State<AppState>, Authenticated(_member): Authenticated) -> ApiResult<Json<Server>> {
    let server = ecto_db::repo::servers::get(&state.db, state.server_id).await?;
    Ok(Json(server))
}

#[derive(Deserialize)]
pub struct UpdateServerConfigBody {
    pub max_upload_size_bytes: Option<i64>,
    pub max_shared_storage_bytes: Option<i64>,
    pub allow_local_accounts: Option<bool>,
    pub require_invite: Option<bool>,
    pub allow_member_dms: Option<bool>,
    pub show_system_messages: Option<bool>,
}

pub async fn get_server_config(State(state): State<AppState>, Authenticated(_member): Authenticated) -> ApiResult<Json<ServerConfig>> {
    let config = ecto_db::repo::servers::get_config(&state.db, state.server_id).await?;
    Ok(Json(config))
}

pub async fn update_server_config(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<UpdateServerConfigBody>,
) -> ApiResult<Json<ServerConfig>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_SERVER).await?;

    let mut config = ecto_db::repo::servers::get_config(&state.db, state.server_id).await?;
    if let Some(v) = body.max_upload_size_bytes {
        config.max_upload_size_bytes = v;
    }
    if let Some(v) = body.max_shared_storage_bytes {
        config.max_shared_storage_bytes = v;
    }
    if let Some(v) = body.allow_local_accounts {
        config.allow_local_accounts = v;
    }
    if let Some(v) = body.require_invite {
        config.require_invite = v;
    }
    if let Some(v) = body.allow_member_dms {
        config.allow_member_dms = v;
    }
    if let Some(v) = body.show_system_messages {
        config.show_system_messages = v;
    }
    ecto_db::repo::servers::update_config(&state.db, &config).await?;

    state.sessions.dispatch_to_server(state.server_id, "server.config_update", json!(config));
    Ok(Json(config))
}

// ── Categories ───────────────────────────────────────────────────────────

pub async fn list_categories(State(state): State<AppState>, Authenticated(_member): Authenticated) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(ecto_db::repo::servers::list_categories(&state.db, state.server_id).await?))
}

#[derive(Deserialize)]
pub struct CreateCategoryBody {
    pub name: String,
    #[serde(default)]
    pub position: i32,
}

pub async fn create_category(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<CreateCategoryBody>,
) -> ApiResult<Json<Category>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_CHANNELS).await?;
    if body.name.trim().is_empty() {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "name must not be empty").into());
    }
    let category = ecto_db::repo::servers::create_category(&state.db, state.server_id, &body.name, body.position).await?;
    state.sessions.dispatch_to_server(state.server_id, "category.create", json!(category));
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(category_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_CHANNELS).await?;
    ecto_db::repo::servers::delete_category(&state.db, category_id).await?;
    state.sessions.dispatch_to_server(state.server_id, "category.delete", json!({ "id": category_id }));
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ReorderBody {
    pub ordered_ids: Vec<Uuid>,
}

pub async fn reorder_categories(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<ReorderBody>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_CHANNELS).await?;
    ecto_db::repo::servers::reorder_categories(&state.db, &body.ordered_ids).await?;
    state.sessions.dispatch_to_server(state.server_id, "category.reorder", json!({ "ordered_ids": body.ordered_ids }));
    Ok(Json(json!({ "ok": true })))
}

// ── Membership lifecycle ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct JoinServerBody {
    pub invite_code: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(serde::Serialize)]
pub struct JoinServerResponse {
    pub member: ecto_domain::entities::Member,
    pub token: String,
}

/// `server.join`: the one mutation a caller may hit before they're a member.
/// Either an `Authorization: Bearer` for an already-verified identity (global
/// or a previously-registered local account), or local credentials to
/// register-or-login a fresh local account.
pub async fn join_server(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<JoinServerBody>,
) -> ApiResult<Json<JoinServerResponse>> {
    let bearer = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer "));

    let identity = if let Some(token) = bearer {
        crate::auth::verify_token(&state, token).await?
    } else {
        resolve_local_identity(&state, body.username.as_deref(), body.password.as_deref()).await?
    };

    if ecto_db::repo::bans::get(&state.db, state.server_id, identity.user_id).await?.is_some() {
        return Err(EctoError::Forbidden.into());
    }

    let config = ecto_db::repo::servers::get_config(&state.db, state.server_id).await?;
    if let Some(code) = &body.invite_code {
        let invite = ecto_db::repo::invites::get(&state.db, code).await?;
        if invite.server_id != state.server_id || !invite.is_usable(chrono::Utc::now()) {
            return Err(EctoError::not_found(ecto_domain::error::codes::INVITE_INVALID, "invite is no longer valid").into());
        }
    } else if config.require_invite {
        return Err(EctoError::not_found(ecto_domain::error::codes::INVITE_INVALID, "this server requires an invite").into());
    }

    let member = match ecto_db::repo::members::get(&state.db, state.server_id, identity.user_id).await {
        Ok(existing) => existing,
        Err(_) => {
            let is_first = ecto_db::repo::members::count(&state.db, state.server_id).await? == 0;
            let member =
                ecto_db::repo::members::join(&state.db, state.server_id, identity.user_id, identity.identity_type, state.default_role_id)
                    .await?;
            if is_first {
                ecto_db::repo::servers::set_owner(&state.db, state.server_id, identity.user_id).await?;
            }
            if let Some(code) = &body.invite_code {
                ecto_db::repo::invites::increment_use(&state.db, code).await?;
            }
            state.sessions.dispatch_to_server(state.server_id, "member.add", json!(member));
            member
        }
    };

    let token = crate::auth::jwt::encode(&state.config.jwt_secret, identity.user_id, identity.identity_type, Some(member.token_version))?;
    Ok(Json(JoinServerResponse { member, token }))
}

/// Registers (if the username is new) or logs in (if it already exists) a
/// local account, returning the resolved identity to join with.
async fn resolve_local_identity(state: &AppState, username: Option<&str>, password: Option<&str>) -> ecto_domain::Result<VerifiedIdentity> {
    if !state.config.allow_local_accounts {
        return Err(EctoError::Forbidden);
    }
    let (username, password) = match (username, password) {
        (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => (u, p),
        _ => return Err(EctoError::Auth("missing credentials".into())),
    };

    let user_id = match ecto_db::repo::users::find_local_user_by_username(&state.db, username).await? {
        Some(existing) => {
            if !crate::auth::verify_password(password, &existing.password_hash)? {
                return Err(EctoError::Auth("invalid username or password".into()));
            }
            existing.id
        }
        None => {
            let hash = crate::auth::hash_password(password)?;
            ecto_db::repo::users::create_local_user(&state.db, username, &hash, None).await?.id
        }
    };
    Ok(VerifiedIdentity { user_id, identity_type: IdentityType::Local, token_version_claim: None })
}

pub async fn leave_server(State(state): State<AppState>, Authenticated(member): Authenticated) -> ApiResult<Json<serde_json::Value>> {
    let server = ecto_db::repo::servers::get(&state.db, state.server_id).await?;
    if server.admin_user_id == member.user_id {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "the owner cannot leave their own server").into());
    }
    ecto_db::repo::members::leave(&state.db, state.server_id, member.user_id).await?;
    state.sessions.dispatch_to_server(state.server_id, "member.leave", json!({ "user_id": member.user_id }));
    Ok(Json(json!({ "ok": true })))
}
