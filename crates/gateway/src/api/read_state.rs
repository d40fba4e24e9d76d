//! `read_states` router: per-user last-read markers, server-scoped.

use axum::extract::{Path, State};
use axum::Json;
use ecto_domain::entities::ReadState;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_read_states(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
) -> ApiResult<Json<Vec<ReadState>>> {
    Ok(Json(ecto_db::repo::read_state::list_for_user(&state.db, state.server_id, member.user_id).await?))
}

#[derive(Deserialize)]
pub struct MarkReadBody {
    pub last_read_message_id: Uuid,
}

pub async fn mark_read(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<MarkReadBody>,
) -> ApiResult<Json<serde_json::Value>> {
    ecto_db::repo::read_state::mark_read(&state.db, channel_id, member.user_id, body.last_read_message_id).await?;
    Ok(Json(json!({ "ok": true })))
}
