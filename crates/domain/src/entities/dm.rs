use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Participants always stored in canonical (lexicographic) order —
/// `user_a < user_b`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DmConversation {
    pub id: Uuid,
    pub server_id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DmConversation {
    /// Returns `(lesser, greater)` to match the canonical column order.
    pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a < b { (a, b) } else { (b, a) }
    }

    pub fn other(&self, user_id: Uuid) -> Uuid {
        if self.user_a == user_id { self.user_b } else { self.user_a }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DmReadState {
    pub user_id: Uuid,
    pub conversation_id: Uuid,
    pub last_read_message_id: Option<Uuid>,
}
