//! `search` router: full-text/`LIKE` search scoped to a single channel.

use axum::extract::{Path, Query, State};
use axum::Json;
use ecto_domain::entities::Message;
use ecto_domain::permissions::Permission;
use ecto_domain::EctoError;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 25;
const MAX_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<i64>,
}

pub async fn search_channel(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    perm::require_channel(&state, member.user_id, channel_id, Permission::READ_MESSAGES).await?;
    if query.q.trim().is_empty() {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "q must not be empty").into());
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let results = ecto_db::repo::search::search_channel(&state.db, state.config.database_type, channel_id, &query.q, limit).await?;
    Ok(Json(results))
}
