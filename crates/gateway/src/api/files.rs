//! `files` router: multipart upload endpoints for channel/shared/DM
//! attachments and server images, plus the `GET /files/...` serving route.
//! Quota/size enforcement happens here, before the bytes ever reach
//! `ecto_gateway::upload` or the `attachments`/`shared_files` tables.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use ecto_domain::entities::{Attachment, ChannelType, SharedFile};
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde_json::json;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::upload::ImageKind;

struct UploadedFile {
    filename: String,
    bytes: Bytes,
}

/// Drains a multipart body looking for a single `file` field plus whatever
/// other text fields the caller named. Returns the file and a lookup of
/// the remaining fields by name.
async fn read_multipart(mut multipart: Multipart) -> ApiResult<(UploadedFile, std::collections::HashMap<String, String>)> {
    let mut file = None;
    let mut fields = std::collections::HashMap::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| EctoError::validation(ecto_domain::error::codes::VALIDATION, e.to_string()))? {
        let Some(name) = field.name().map(str::to_owned) else { continue };
        if name == "file" {
            let filename = field.file_name().map(str::to_owned).unwrap_or_else(|| "upload".to_string());
            let bytes = field.bytes().await.map_err(|e| EctoError::Storage(e.to_string()))?;
            file = Some(UploadedFile { filename, bytes });
        } else {
            let value = field.text().await.map_err(|e| EctoError::validation(ecto_domain::error::codes::VALIDATION, e.to_string()))?;
            fields.insert(name, value);
        }
    }
    let file = file.ok_or_else(|| EctoError::validation(ecto_domain::error::codes::VALIDATION, "missing file field"))?;
    Ok((file, fields))
}

/// `POST /upload` — attachment upload, bound to a channel message once the
/// message is sent (see `messages::send`'s `attachment_ids`).
pub async fn upload_attachment(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let (file, fields) = read_multipart(multipart).await?;
    let channel_id: Uuid = fields
        .get("channel_id")
        .ok_or_else(|| EctoError::validation(ecto_domain::error::codes::VALIDATION, "missing channel_id field"))?
        .parse()
        .map_err(|_| EctoError::validation(ecto_domain::error::codes::VALIDATION, "invalid channel_id"))?;

    let channel = ecto_db::repo::channels::get(&state.db, channel_id).await?;
    if channel.kind == ChannelType::Page {
        return Err(EctoError::validation(ecto_domain::error::codes::WRONG_CHANNEL_TYPE, "page channels don't take attachments").into());
    }
    perm::require_channel(&state, member.user_id, channel_id, Permission::ATTACH_FILES).await?;

    let config = ecto_db::repo::servers::get_config(&state.db, state.server_id).await?;
    enforce_upload_quota(&state, config.max_upload_size_bytes, file.bytes.len() as i64).await?;

    let id = Uuid::now_v7();
    let url = crate::upload::save_channel_attachment(&state.config, state.server_id, channel_id, id, &file.filename, &file.bytes).await?;
    let content_type = guess_content_type(&file.filename);
    let attachment: Attachment =
        ecto_db::repo::messages::create_attachment(&state.db, id, &file.filename, &url, content_type.as_deref(), file.bytes.len() as i64).await?;
    Ok(axum::Json(attachment))
}

/// `POST /shared/upload` — `SharedFile`, requires `UPLOAD_SHARED_FILES`
/// through the (possibly folder-chained) shared-item override resolver.
pub async fn upload_shared_file(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let (file, fields) = read_multipart(multipart).await?;
    let folder_id: Option<Uuid> = match fields.get("folder_id") {
        Some(s) if !s.is_empty() => {
            Some(s.parse().map_err(|_| ApiError(EctoError::validation(ecto_domain::error::codes::VALIDATION, "invalid folder_id")))?)
        }
        _ => None,
    };

    let effective_item_id = folder_id.unwrap_or(state.server_id);
    let item_type = if folder_id.is_some() { "folder" } else { "root" };
    perm::require_shared_item(&state, member.user_id, item_type, effective_item_id, folder_id, Permission::UPLOAD_SHARED_FILES).await?;

    let config = ecto_db::repo::servers::get_config(&state.db, state.server_id).await?;
    enforce_upload_quota(&state, config.max_upload_size_bytes, file.bytes.len() as i64).await?;

    let used = ecto_db::repo::shared::total_storage_used(&state.db, state.server_id).await?;
    if used + file.bytes.len() as i64 > config.max_shared_storage_bytes {
        return Err(EctoError::Quota("shared storage quota exceeded".into()).into());
    }

    let id = Uuid::now_v7();
    let url = crate::upload::save_shared_file(&state.config, state.server_id, folder_id, id, &file.filename, &file.bytes).await?;
    let content_type = guess_content_type(&file.filename);
    let shared: SharedFile = ecto_db::repo::shared::create_file(
        &state.db,
        state.server_id,
        folder_id,
        &file.filename,
        &url,
        content_type.as_deref(),
        file.bytes.len() as i64,
        member.user_id,
    )
    .await?;
    Ok(axum::Json(shared))
}

/// `POST /dm/upload` — a DM attachment, bound via the conversation id (a
/// DM conversation is itself a `channel_id` in the `messages` table).
pub async fn upload_dm_attachment(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let (file, fields) = read_multipart(multipart).await?;
    let conversation_id: Uuid = fields
        .get("conversation_id")
        .ok_or_else(|| EctoError::validation(ecto_domain::error::codes::VALIDATION, "missing conversation_id field"))?
        .parse()
        .map_err(|_| EctoError::validation(ecto_domain::error::codes::VALIDATION, "invalid conversation_id"))?;

    let conversation = ecto_db::repo::dms::get(&state.db, conversation_id).await?;
    if conversation.user_a != member.user_id && conversation.user_b != member.user_id {
        return Err(EctoError::not_found(ecto_domain::error::codes::DM_NOT_A_RECIPIENT, "not a participant in this conversation").into());
    }

    let config = ecto_db::repo::servers::get_config(&state.db, state.server_id).await?;
    enforce_upload_quota(&state, config.max_upload_size_bytes, file.bytes.len() as i64).await?;

    let id = Uuid::now_v7();
    let url = crate::upload::save_dm_attachment(&state.config, state.server_id, conversation_id, id, &file.filename, &file.bytes).await?;
    let content_type = guess_content_type(&file.filename);
    let attachment: Attachment =
        ecto_db::repo::messages::create_attachment(&state.db, id, &file.filename, &url, content_type.as_deref(), file.bytes.len() as i64).await?;
    Ok(axum::Json(attachment))
}

/// `POST /upload/icon|banner|page-banner` — image-only uploads gated on
/// `MANAGE_SERVER` (or `EDIT_PAGES` for the page banner, which also needs
/// the target channel).
pub async fn upload_icon(state: State<AppState>, auth: Authenticated, multipart: Multipart) -> ApiResult<impl IntoResponse> {
    upload_image(state, auth, ImageKind::Icon, multipart).await
}

pub async fn upload_banner(state: State<AppState>, auth: Authenticated, multipart: Multipart) -> ApiResult<impl IntoResponse> {
    upload_image(state, auth, ImageKind::Banner, multipart).await
}

pub async fn upload_page_banner(state: State<AppState>, auth: Authenticated, multipart: Multipart) -> ApiResult<impl IntoResponse> {
    upload_image(state, auth, ImageKind::PageBanner, multipart).await
}

async fn upload_image(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    kind: ImageKind,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    perm::require_server(&state, member.user_id, Permission::MANAGE_SERVER).await?;
    let (file, _fields) = read_multipart(multipart).await?;
    if !is_image(&file.filename) {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "only image uploads are accepted here").into());
    }
    if file.bytes.len() as i64 > kind.max_bytes() {
        return Err(EctoError::Quota(format!("image exceeds the {}-byte limit for this upload kind", kind.max_bytes())).into());
    }
    let url = crate::upload::save_image(&state.config, state.server_id, kind, &file.filename, &file.bytes).await?;
    Ok(axum::Json(json!({ "url": url })))
}

/// `GET /files/{*path}` — serves previously uploaded bytes with a
/// long-lived cache header; path traversal is rejected by
/// `ecto_gateway::upload::read_file`.
pub async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> ApiResult<impl IntoResponse> {
    let bytes = crate::upload::read_file(&state.config, &path).await?;
    let content_type = guess_content_type(&path).unwrap_or_else(|| "application/octet-stream".to_string());
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap_or(header::HeaderValue::from_static("application/octet-stream")));
    headers.insert(header::CONTENT_DISPOSITION, header::HeaderValue::from_static("inline"));
    headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("public, max-age=86400"));
    Ok((headers, bytes))
}

async fn enforce_upload_quota(state: &AppState, max_upload_size_bytes: i64, incoming_bytes: i64) -> ApiResult<()> {
    if incoming_bytes > max_upload_size_bytes {
        return Err(EctoError::Quota(format!("upload exceeds the {max_upload_size_bytes}-byte per-server limit")).into());
    }
    let used = ecto_db::repo::messages::total_attachment_storage_used(&state.db).await?;
    if used + incoming_bytes > state.config.storage_quota_bytes {
        return Err(EctoError::Quota("global storage quota exceeded".into()).into());
    }
    Ok(())
}

fn guess_content_type(filename: &str) -> Option<String> {
    let ext = std::path::Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime.to_string())
}

fn is_image(filename: &str) -> bool {
    guess_content_type(filename).map(|ct| ct.starts_with("image/")).unwrap_or(false)
}
