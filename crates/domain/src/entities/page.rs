use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 1:1 with a `type=page` channel. `version` increases by exactly 1 per
/// successful update.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PageContent {
    pub channel_id: Uuid,
    pub content: String,
    pub banner_url: Option<String>,
    pub version: i32,
    pub edited_by: Option<Uuid>,
    pub edited_at: DateTime<Utc>,
}

/// Snapshot captured with the *pre*-update version, before the bump.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PageRevision {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub content: String,
    pub version: i32,
    pub edited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
