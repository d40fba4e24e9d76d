use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::channel::OverrideTargetColumn;

/// A node in the shared-folder tree. `parent_id`'s chain always terminates
/// at `None` — enforced on insert/move by `ecto-db::shared` (no
/// cycle-checking needed at read time).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SharedFolder {
    pub id: Uuid,
    pub server_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SharedItemType {
    Folder,
    File,
}

/// Unique on `(item_type, item_id, target_type, target_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SharedItemPermissionOverride {
    pub id: Uuid,
    pub item_type: SharedItemType,
    pub item_id: Uuid,
    pub target_type: OverrideTargetColumn,
    pub target_id: Uuid,
    pub allow: i64,
    pub deny: i64,
}
