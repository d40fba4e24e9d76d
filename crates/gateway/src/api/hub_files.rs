//! `hubFiles` router: the shared-folder tree (CRUD, move, overrides) and
//! the files inside it. Permission checks fold the ancestor-folder override
//! chain via `perm::require_shared_item`/`effective_mask_for_shared_item`
//! (§4.1's "shared items" rule) rather than the channel/category layering
//! used everywhere else.

use axum::extract::{Path, Query, State};
use axum::Json;
use ecto_domain::entities::{SharedFile, SharedFolder, SharedItemPermissionOverride};
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ParentQuery {
    pub parent_id: Option<Uuid>,
}

/// `listFolders(parent_id?)`: a folder is visible if the caller's folded
/// mask (base ⊕ ancestor chain through that folder) still carries
/// `BROWSE_FILES` — a deny higher up the chain can be re-granted lower
/// down, which is exactly the override-chain semantics being tested.
pub async fn list_folders(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Query(query): Query<ParentQuery>,
) -> ApiResult<Json<Vec<SharedFolder>>> {
    let all = ecto_db::repo::shared::list_folders(&state.db, state.server_id, query.parent_id).await?;
    let mut visible = Vec::with_capacity(all.len());
    for folder in all {
        let mask = perm::effective_mask_for_shared_item(&state, member.user_id, "folder", folder.id, Some(folder.id)).await?;
        if mask.has(Permission::BROWSE_FILES) {
            visible.push(folder);
        }
    }
    Ok(Json(visible))
}

#[derive(Deserialize)]
pub struct CreateFolderBody {
    pub parent_id: Option<Uuid>,
    pub name: String,
}

pub async fn create_folder(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Json(body): Json<CreateFolderBody>,
) -> ApiResult<Json<SharedFolder>> {
    if body.name.trim().is_empty() {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "name must not be empty").into());
    }
    perm::require_shared_item(&state, member.user_id, "folder", body.parent_id.unwrap_or(state.server_id), body.parent_id, Permission::MANAGE_FILES)
        .await?;
    let folder = ecto_db::repo::shared::create_folder(&state.db, state.server_id, body.parent_id, body.name.trim()).await?;
    state.sessions.dispatch_to_server(state.server_id, "hub_folder.create", json!(folder));
    Ok(Json(folder))
}

#[derive(Deserialize)]
pub struct MoveFolderBody {
    pub new_parent_id: Option<Uuid>,
}

pub async fn move_folder(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(folder_id): Path<Uuid>,
    Json(body): Json<MoveFolderBody>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_shared_item(&state, member.user_id, "folder", folder_id, Some(folder_id), Permission::MANAGE_FILES).await?;
    ecto_db::repo::shared::move_folder(&state.db, folder_id, body.new_parent_id).await?;
    state.sessions.dispatch_to_server(state.server_id, "hub_folder.update", json!({ "id": folder_id, "parent_id": body.new_parent_id }));
    Ok(Json(json!({ "ok": true })))
}

/// Deletes a folder and every descendant folder/file (DB rows cascade via
/// `ecto_db::repo::shared::delete_folder`); the bytes backing each
/// descendant file are released afterward since the DB is the source of
/// truth for "does this file still exist" and disk cleanup is best-effort.
pub async fn delete_folder(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(folder_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_shared_item(&state, member.user_id, "folder", folder_id, Some(folder_id), Permission::MANAGE_FILES).await?;
    let files = ecto_db::repo::shared::files_in_subtree(&state.db, state.server_id, folder_id).await?;
    ecto_db::repo::shared::delete_folder(&state.db, folder_id).await?;
    for file in &files {
        crate::upload::delete_by_url(&state.config, &file.url).await;
    }
    state.sessions.dispatch_to_server(state.server_id, "hub_folder.delete", json!({ "id": folder_id }));
    Ok(Json(json!({ "ok": true })))
}

/// `listSharedFiles(folder_id?)`: same override-chain filter as
/// `list_folders`, evaluated against each file's own chain (which includes
/// the file's own override layer on top of its ancestor folders').
pub async fn list_files(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Query(query): Query<ParentQuery>,
) -> ApiResult<Json<Vec<SharedFile>>> {
    let folder_id = query.parent_id;
    let all = ecto_db::repo::shared::list_files(&state.db, state.server_id, folder_id).await?;
    let mut visible = Vec::with_capacity(all.len());
    for file in all {
        let mask = perm::effective_mask_for_shared_item(&state, member.user_id, "file", file.id, folder_id).await?;
        if mask.has(Permission::BROWSE_FILES) {
            visible.push(file);
        }
    }
    Ok(Json(visible))
}

pub async fn get_file(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Json<SharedFile>> {
    let file = ecto_db::repo::shared::get_file(&state.db, file_id).await?;
    perm::require_shared_item(&state, member.user_id, "file", file_id, file.folder_id, Permission::BROWSE_FILES).await?;
    Ok(Json(file))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let file = ecto_db::repo::shared::get_file(&state.db, file_id).await?;
    perm::require_shared_item(&state, member.user_id, "file", file_id, file.folder_id, Permission::MANAGE_FILES).await?;
    ecto_db::repo::shared::delete_file(&state.db, file_id).await?;
    crate::upload::delete_by_url(&state.config, &file.url).await;
    state.sessions.dispatch_to_server(state.server_id, "hub_file.delete", json!({ "id": file_id }));
    Ok(Json(json!({ "ok": true })))
}

// ── Overrides ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ItemRef {
    pub item_type: String,
    pub item_id: Uuid,
}

pub async fn list_overrides(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Query(item): Query<ItemRef>,
) -> ApiResult<Json<Vec<SharedItemPermissionOverride>>> {
    perm::require_shared_item(&state, member.user_id, &item.item_type, item.item_id, Some(item.item_id), Permission::MANAGE_FILES).await?;
    Ok(Json(ecto_db::repo::shared::list_overrides(&state.db, &item.item_type, item.item_id).await?))
}

#[derive(Deserialize)]
pub struct UpsertOverrideBody {
    pub item_type: String,
    pub item_id: Uuid,
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
    Json(body): Json<UpsertOverrideBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if body.item_type != "folder" && body.item_type != "file" {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "item_type must be folder or file").into());
    }
    if body.target_type != "role" && body.target_type != "member" {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "target_type must be role or member").into());
    }
    perm::require_shared_item(&state, member.user_id, &body.item_type, body.item_id, Some(body.item_id), Permission::MANAGE_FILES).await?;
    ecto_db::repo::shared::upsert_override(&state.db, &body.item_type, body.item_id, &body.target_type, body.target_id, body.allow, body.deny)
        .await?;
    state.sessions.dispatch_to_server(
        state.server_id,
        "hub_override.update",
        json!({ "item_type": body.item_type, "item_id": body.item_id, "target_type": body.target_type, "target_id": body.target_id }),
    );
    Ok(Json(json!({ "ok": true })))
}

pub async fn delete_override(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Query(item): Query<ItemRef>,
    Path((target_type, target_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    perm::require_shared_item(&state, member.user_id, &item.item_type, item.item_id, Some(item.item_id), Permission::MANAGE_FILES).await?;
    ecto_db::repo::shared::delete_override(&state.db, &item.item_type, item.item_id, &target_type, target_id).await?;
    Ok(Json(json!({ "ok": true })))
}
