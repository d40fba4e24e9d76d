use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::Permission;

/// A server role. Exactly one role per server has `is_default = true` (the
/// `@everyone` role) — renamable and permission-editable, never deletable.
///
/// `permissions` is stored as the raw signed 64-bit column; use
/// [`Role::permission_mask`] to get the typed [`Permission`] bitset.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub server_id: Uuid,
    pub name: String,
    pub color: Option<i32>,
    pub permissions: i64,
    /// Higher = more privileged; used for the kick/ban hierarchy check.
    pub position: i32,
    pub is_default: bool,
}

impl Role {
    pub fn permission_mask(&self) -> Permission {
        Permission::from_bits_truncate(self.permissions as u64)
    }

    pub fn set_permission_mask(&mut self, mask: Permission) {
        self.permissions = mask.bits() as i64;
    }
}

/// Many-to-many between members and roles.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberRole {
    pub member_id: Uuid,
    pub role_id: Uuid,
}
