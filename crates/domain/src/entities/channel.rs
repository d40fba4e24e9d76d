use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::{OverrideTarget, Override, Permission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Text,
    Voice,
    Page,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: Uuid,
    pub server_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub kind: ChannelType,
    pub topic: Option<String>,
    pub position: i32,
    pub slowmode_seconds: i32,
    pub nsfw: bool,
}

/// Shared shape of the channel/category override tables; `target_type`
/// distinguishes role vs. member rows.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PermissionOverrideRow {
    pub id: Uuid,
    pub target_type: OverrideTargetColumn,
    pub target_id: Uuid,
    pub allow: i64,
    pub deny: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OverrideTargetColumn {
    Role,
    Member,
}

impl From<OverrideTargetColumn> for OverrideTarget {
    fn from(c: OverrideTargetColumn) -> Self {
        match c {
            OverrideTargetColumn::Role => OverrideTarget::Role,
            OverrideTargetColumn::Member => OverrideTarget::Member,
        }
    }
}

impl PermissionOverrideRow {
    pub fn to_override(&self) -> Override {
        Override {
            target: self.target_type.into(),
            target_id: self.target_id,
            allow: Permission::from_bits_truncate(self.allow as u64),
            deny: Permission::from_bits_truncate(self.deny as u64),
        }
    }
}
