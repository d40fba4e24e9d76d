//! `pages` router: the document-style content of a `type=page` channel,
//! with optimistic-concurrency edits and a revision history.

use axum::extract::{Path, Query, State};
use axum::Json;
use ecto_domain::entities::{PageContent, PageRevision};
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

const MAX_CONTENT_BYTES: usize = 200 * 1024;
const DEFAULT_REVISION_LIMIT: i64 = 20;

pub async fn get_page(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
) -> ApiResult<Json<PageContent>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::READ_MESSAGES).await?;
    Ok(Json(ecto_db::repo::pages::get(&state.db, channel_id).await?))
}

#[derive(Deserialize)]
pub struct UpdatePageBody {
    pub content: String,
    pub expected_version: i32,
}

pub async fn update_page(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<UpdatePageBody>,
) -> ApiResult<Json<PageContent>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::EDIT_PAGES).await?;
    if body.content.len() > MAX_CONTENT_BYTES {
        return Err(EctoError::validation(ecto_domain::error::codes::CONTENT_INVALID, "page content too large").into());
    }
    let page = ecto_db::repo::pages::update_content(&state.db, channel_id, &body.content, body.expected_version, member.user_id).await?;
    state.sessions.dispatch_to_channel(channel_id, "page.update", json!(page));
    Ok(Json(page))
}

pub async fn set_page_banner(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    mut multipart: axum::extract::Multipart,
) -> ApiResult<Json<PageContent>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::EDIT_PAGES).await?;

    let mut filename = None;
    let mut bytes = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| EctoError::Validation {
        code: ecto_domain::error::codes::VALIDATION,
        message: e.to_string(),
    })? {
        if field.name() == Some("file") {
            filename = field.file_name().map(str::to_owned);
            bytes = Some(field.bytes().await.map_err(|e| EctoError::Storage(e.to_string()))?);
        }
    }
    let filename = filename.ok_or_else(|| EctoError::validation(ecto_domain::error::codes::VALIDATION, "missing file"))?;
    let bytes = bytes.ok_or_else(|| EctoError::validation(ecto_domain::error::codes::VALIDATION, "missing file"))?;

    let channel = ecto_db::repo::channels::get(&state.db, channel_id).await?;
    let url = crate::upload::save_image(&state.config, channel.server_id, crate::upload::ImageKind::PageBanner, &filename, &bytes).await?;
    let page = ecto_db::repo::pages::set_banner(&state.db, channel_id, &url).await?;
    state.sessions.dispatch_to_channel(channel_id, "page.update", json!(page));
    Ok(Json(page))
}

#[derive(Deserialize)]
pub struct ListRevisionsQuery {
    pub limit: Option<i64>,
}

pub async fn list_revisions(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<ListRevisionsQuery>,
) -> ApiResult<Json<Vec<PageRevision>>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::READ_MESSAGES).await?;
    let limit = query.limit.unwrap_or(DEFAULT_REVISION_LIMIT).clamp(1, 100);
    Ok(Json(ecto_db::repo::pages::list_revisions(&state.db, channel_id, limit).await?))
}
