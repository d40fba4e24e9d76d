use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique on `(server_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ban {
    pub server_id: Uuid,
    pub user_id: Uuid,
    pub banned_by: Uuid,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Window for the `delete_messages` option on `ban`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMessagesWindow {
    OneHour,
    OneDay,
    SevenDays,
}

impl DeleteMessagesWindow {
    pub fn as_duration(self) -> chrono::Duration {
        match self {
            DeleteMessagesWindow::OneHour => chrono::Duration::hours(1),
            DeleteMessagesWindow::OneDay => chrono::Duration::days(1),
            DeleteMessagesWindow::SevenDays => chrono::Duration::days(7),
        }
    }
}
