use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The singleton tenant row. A process ever has exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Server {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub banner_url: Option<String>,
    /// Owner override — always passes every permission check.
    pub admin_user_id: Uuid,
    pub setup_complete: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-server tunables, 1:1 with [`Server`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServerConfig {
    pub server_id: Uuid,
    pub max_upload_size_bytes: i64,
    pub max_shared_storage_bytes: i64,
    pub allow_local_accounts: bool,
    pub require_invite: bool,
    pub allow_member_dms: bool,
    pub show_system_messages: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_id: Uuid::nil(),
            max_upload_size_bytes: 25 * 1024 * 1024,
            max_shared_storage_bytes: 10 * 1024 * 1024 * 1024,
            allow_local_accounts: true,
            require_invite: false,
            allow_member_dms: true,
            show_system_messages: true,
        }
    }
}

/// Category grouping channels, ordered by `position`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub server_id: Uuid,
    pub name: String,
    pub position: i32,
}
