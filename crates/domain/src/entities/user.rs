use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A password-auth account. Hashing itself is an
/// external collaborator — see `ecto-gateway::auth::hash_password`, which
/// wraps the `argon2` crate; this struct only ever stores the PHC digest.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LocalUser {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A cached copy of an externally-resolved identity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CachedProfile {
    pub external_user_id: Uuid,
    pub username: String,
    pub discriminator: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IdentityType {
    Global,
    Local,
}

/// A user's participation in the server. Unique on
/// `(server_id, user_id)` — enforced by a DB constraint, not here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: Uuid,
    pub server_id: Uuid,
    pub user_id: Uuid,
    pub identity_type: IdentityType,
    pub nickname: Option<String>,
    pub allow_dms: bool,
    /// Bumped to invalidate every JWT issued before this value.
    pub token_version: i32,
    pub joined_at: DateTime<Utc>,
}

/// Per-user notification feed entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub server_id: Uuid,
    pub kind: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// `details` has no `Any`-backend JSON/`Value` decode, so it's stored as
/// `TEXT` and parsed by hand.
impl sqlx::FromRow<'_, sqlx::any::AnyRow> for ActivityItem {
    fn from_row(row: &sqlx::any::AnyRow) -> sqlx::Result<Self> {
        use sqlx::Row;
        let details_json: String = row.try_get("details")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            server_id: row.try_get("server_id")?,
            kind: row.try_get("kind")?,
            details: serde_json::from_str(&details_json)
                .map_err(|e| sqlx::Error::ColumnDecode { index: "details".into(), source: Box::new(e) })?,
            created_at: row.try_get("created_at")?,
        })
    }
}
