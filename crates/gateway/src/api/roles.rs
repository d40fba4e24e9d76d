//! `roles` router: CRUD, reorder, and the category-scoped override table a
//! role can carry (channel-scoped overrides live in `channels.rs`).

use axum::extract::{Path, State};
use axum::Json;
use ecto_domain::entities::Role;
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_roles(State(state): State<AppState>, Authenticated(_member): Authenticated) -> ApiResult<Json<Vec<Role>>> {
    Ok(Json(ecto_db::repo::roles::list_for_server(&state.db, state.server_id).await?))
}

#[derive(Deserialize)]
pub struct CreateRoleBody {
    pub name: String,
    #[serde(default)]
    pub position: i32,
}

pub async fn create_role(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<CreateRoleBody>,
) -> ApiResult<Json<Role>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    if body.name.trim().is_empty() {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "name must not be empty").into());
    }
    let role = ecto_db::repo::roles::create(&state.db, state.server_id, &body.name, body.position).await?;
    state.sessions.dispatch_to_server(state.server_id, "role.create", json!(role));
    Ok(Json(role))
}

#[derive(Deserialize)]
pub struct UpdateRoleBody {
    pub name: Option<String>,
    pub color: Option<i32>,
    pub permissions: Option<i64>,
    pub position: Option<i32>,
}

pub async fn update_role(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(role_id): Path<Uuid>,
    Json(body): Json<UpdateRoleBody>,
) -> ApiResult<Json<Role>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    let permissions = body.permissions.map(|bits| Permission::from_bits_truncate(bits as u64));
    let role = ecto_db::repo::roles::update(&state.db, role_id, body.name.as_deref(), body.color, permissions, body.position).await?;
    state.sessions.dispatch_to_server(state.server_id, "role.update", json!(role));
    Ok(Json(role))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(role_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    ecto_db::repo::roles::delete(&state.db, role_id).await?;
    state.sessions.dispatch_to_server(state.server_id, "role.delete", json!({ "id": role_id }));
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct ReorderRolesBody {
    pub ordered_ids: Vec<Uuid>,
}

pub async fn reorder_roles(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<ReorderRolesBody>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    ecto_db::repo::roles::reorder(&state.db, &body.ordered_ids).await?;
    state.sessions.dispatch_to_server(state.server_id, "role.reorder", json!({ "ordered_ids": body.ordered_ids }));
    Ok(Json(json!({ "ok": true })))
}

// ── Category overrides ───────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CategoryOverride {
    pub id: Uuid,
    pub target_type: String,
    pub target_id: Uuid,
    pub allow: i64,
    pub deny: i64,
}

pub async fn list_category_overrides(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(category_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CategoryOverride>>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    let rows = ecto_db::repo::roles::list_overrides_for_category(&state.db, category_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(id, target_type, target_id, allow, deny)| CategoryOverride { id, target_type, target_id, allow, deny })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct UpsertCategoryOverrideBody {
    pub target_type: String,
    pub target_id: Uuid,
    #[serde(default)]
    pub allow: i64,
    #[serde(default)]
    pub deny: i64,
}

pub async fn upsert_category_override(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(category_id): Path<Uuid>,
    Json(body): Json<UpsertCategoryOverrideBody>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    if body.target_type != "role" && body.target_type != "member" {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "target_type must be role or member").into());
    }
    ecto_db::repo::roles::upsert_category_override(&state.db, category_id, &body.target_type, body.target_id, body.allow, body.deny).await?;
    state.sessions.dispatch_to_server(
        state.server_id,
        "category.override_update",
        json!({ "category_id": category_id, "target_type": body.target_type, "target_id": body.target_id, "allow": body.allow, "deny": body.deny }),
    );
    Ok(Json(json!({ "ok": true })))
}

pub async fn delete_category_override(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path((category_id, target_type, target_id)): Path<(Uuid, String, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_ROLES).await?;
    ecto_db::repo::roles::delete_category_override(&state.db, category_id, &target_type, target_id).await?;
    state.sessions.dispatch_to_server(
        state.server_id,
        "category.override_delete",
        json!({ "category_id": category_id, "target_type": target_type, "target_id": target_id }),
    );
    Ok(Json(json!({ "ok": true })))
}
