use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "int4")]
#[repr(i32)]
pub enum MessageType {
    Default = 0,
    PinAdded = 1,
    MemberJoin = 2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub author_id: Uuid,
    pub content: Option<String>,
    pub kind: MessageType,
    pub reply_to: Option<Uuid>,
    pub pinned: bool,
    pub deleted: bool,
    pub mention_everyone: bool,
    pub mention_roles: Vec<Uuid>,
    pub mention_users: Vec<Uuid>,
    pub webhook_id: Option<Uuid>,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// `mention_roles`/`mention_users` have no `Any`-backend array type, so
/// they're stored as a JSON-array `TEXT` column and decoded by hand rather
/// than through the derive.
impl sqlx::FromRow<'_, sqlx::any::AnyRow> for Message {
    fn from_row(row: &sqlx::any::AnyRow) -> sqlx::Result<Self> {
        use sqlx::Row;
        let mention_roles_json: String = row.try_get("mention_roles")?;
        let mention_users_json: String = row.try_get("mention_users")?;
        Ok(Self {
            id: row.try_get("id")?,
            channel_id: row.try_get("channel_id")?,
            author_id: row.try_get("author_id")?,
            content: row.try_get("content")?,
            kind: row.try_get("message_type")?,
            reply_to: row.try_get("reply_to")?,
            pinned: row.try_get("pinned")?,
            deleted: row.try_get("deleted")?,
            mention_everyone: row.try_get("mention_everyone")?,
            mention_roles: parse_id_array(&mention_roles_json)?,
            mention_users: parse_id_array(&mention_users_json)?,
            webhook_id: row.try_get("webhook_id")?,
            edited_at: row.try_get("edited_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn parse_id_array(json: &str) -> sqlx::Result<Vec<Uuid>> {
    serde_json::from_str(json).map_err(|e| sqlx::Error::ColumnDecode { index: "mention ids".into(), source: Box::new(e) })
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub message_id: Option<Uuid>,
    pub filename: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reaction {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReadState {
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub last_read_message_id: Option<Uuid>,
    pub mention_count: i32,
}
