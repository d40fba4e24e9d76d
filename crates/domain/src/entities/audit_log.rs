use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-scoped, append-only. Never updated or deleted once written.
/// `details` holds action-specific fields as a JSON blob rather than a
/// dedicated column per action type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub server_id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// `details` has no `Any`-backend JSON/`Value` decode, so it's stored as
/// `TEXT` and parsed by hand.
impl sqlx::FromRow<'_, sqlx::any::AnyRow> for AuditLogEntry {
    fn from_row(row: &sqlx::any::AnyRow) -> sqlx::Result<Self> {
        use sqlx::Row;
        let details_json: String = row.try_get("details")?;
        Ok(Self {
            id: row.try_get("id")?,
            server_id: row.try_get("server_id")?,
            actor_id: row.try_get("actor_id")?,
            action: row.try_get("action")?,
            target_type: row.try_get("target_type")?,
            target_id: row.try_get("target_id")?,
            details: serde_json::from_str(&details_json)
                .map_err(|e| sqlx::Error::ColumnDecode { index: "details".into(), source: Box::new(e) })?,
            created_at: row.try_get("created_at")?,
        })
    }
}
