use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Webhook {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub server_id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
    /// Opaque bearer secret for `POST /webhooks/{id}/{token}`; regeneratable.
    #[serde(skip_serializing)]
    pub token: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
