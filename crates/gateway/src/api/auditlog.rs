//! `auditLog` router: paginated, append-only record of moderation and
//! server-management actions. Write side lives inline in the handlers that
//! perform those actions (`ecto_db::repo::audit::record`); this file is
//! read-only.

use axum::extract::{Query, State};
use axum::Json;
use ecto_domain::entities::AuditLogEntry;
use ecto_domain::permissions::Permission;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::perm;
use crate::auth::Authenticated;
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Deserialize)]
pub struct ListAuditLogQuery {
    pub before: Option<Uuid>,
    pub limit: Option<i64>,
}

pub async fn list_audit_log(
    State(state): State<AppState>,
    Authenticated(member): Authenticated,
    Query(query): Query<ListAuditLogQuery>,
) -> ApiResult<Json<Vec<AuditLogEntry>>> {
    perm::require_server(&state, member.user_id, Permission::VIEW_AUDIT_LOG).await?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let entries = ecto_db::repo::audit::list(&state.db, state.server_id, query.before, limit).await?;
    Ok(Json(entries))
}
