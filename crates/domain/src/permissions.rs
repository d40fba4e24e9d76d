//! The permission bitmask calculus.
//!
//! [`Permission`] is a 64-bit flag set, one bit per well-known permission.
//! [`compute`] folds a base role mask through the category → channel →
//! member override layers in a fixed order. Building the [`PermissionContext`]
//! (which rows apply) is I/O and lives in `ecto-db`; this module only does
//! the bit arithmetic, so it is exercised directly by unit tests without a
//! database.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Permission: u64 {
        const ADMINISTRATOR        = 1 << 0;
        const MANAGE_SERVER        = 1 << 1;
        const MANAGE_CHANNELS      = 1 << 2;
        const MANAGE_ROLES         = 1 << 3;
        const MANAGE_MESSAGES      = 1 << 4;
        const READ_MESSAGES        = 1 << 5;
        const SEND_MESSAGES        = 1 << 6;
        const ATTACH_FILES         = 1 << 7;
        const ADD_REACTIONS        = 1 << 8;
        const MENTION_EVERYONE     = 1 << 9;
        const CREATE_INVITES       = 1 << 10;
        const KICK_MEMBERS         = 1 << 11;
        const BAN_MEMBERS          = 1 << 12;
        const MUTE_MEMBERS         = 1 << 13;
        const DEAFEN_MEMBERS       = 1 << 14;
        const VIEW_AUDIT_LOG       = 1 << 15;
        const MANAGE_WEBHOOKS      = 1 << 16;
        const EDIT_PAGES           = 1 << 17;
        const CONNECT_VOICE        = 1 << 18;
        const SPEAK_VOICE          = 1 << 19;
        const USE_VOICE_ACTIVITY   = 1 << 20;
        const USE_VIDEO            = 1 << 21;
        const SCREEN_SHARE         = 1 << 22;
        const BROWSE_FILES         = 1 << 23;
        const UPLOAD_SHARED_FILES  = 1 << 24;
        const MANAGE_FILES         = 1 << 25;
    }
}

impl Permission {
    pub fn has(&self, bit: Permission) -> bool {
        self.contains(bit)
    }

    pub const ALL_BITS: Permission = Permission::all();
}

/// `target_type` discriminator shared by every override table
/// (`category_permission_overrides`, `channel_permission_overrides`,
/// `shared_item_permission_overrides`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideTarget {
    Role,
    Member,
}

/// One allow/deny pair attached to a role or member at some layer.
#[derive(Debug, Clone, Copy)]
pub struct Override {
    pub target: OverrideTarget,
    pub target_id: uuid::Uuid,
    pub allow: Permission,
    pub deny: Permission,
}

/// Apply one layer's worth of overrides: union all denies, union all
/// allows, then `(base & !deny) | allow` — "deny-wins-within-a-layer,
/// member trumps role by application order".
///
/// `member_id` selects which member override (if any) is folded in last;
/// `role_ids` selects which role overrides apply at all.
pub fn apply_layer(
    base: Permission,
    overrides: &[Override],
    role_ids: &[uuid::Uuid],
    member_id: uuid::Uuid,
) -> Permission {
    let mut role_deny = Permission::empty();
    let mut role_allow = Permission::empty();
    for ov in overrides {
        if let OverrideTarget::Role = ov.target {
            if role_ids.contains(&ov.target_id) {
                role_deny |= ov.deny;
                role_allow |= ov.allow;
            }
        }
    }
    let mut mask = (base & !role_deny) | role_allow;

    for ov in overrides {
        if let OverrideTarget::Member = ov.target {
            if ov.target_id == member_id {
                mask = (mask & !ov.deny) | ov.allow;
            }
        }
    }
    mask
}

/// Inputs needed to compute a member's base mask and then fold in the
/// channel's (and its category's) override layers, already fetched from
/// the database by `ecto-db::permissions::build_context`.
#[derive(Debug, Clone, Default)]
pub struct PermissionContext {
    /// True when `user_id == server.admin_user_id` — short-circuits to all-bits.
    pub is_server_owner: bool,
    /// `@everyone` role's permission mask.
    pub everyone_mask: Permission,
    /// Masks of every non-default role assigned to the member.
    pub role_masks: Vec<Permission>,
    /// IDs of every role assigned to the member (including `@everyone`).
    pub role_ids: Vec<uuid::Uuid>,
    pub member_id: uuid::Uuid,
    /// Overrides on the channel's category, if it has one.
    pub category_overrides: Vec<Override>,
    /// Overrides directly on the channel.
    pub channel_overrides: Vec<Override>,
}

impl PermissionContext {
    /// No member row exists for this user — everything reads as 0.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Compute the effective mask for one (user, channel) pair.
pub fn compute(ctx: &PermissionContext) -> Permission {
    if ctx.is_server_owner {
        return Permission::ALL_BITS;
    }

    let mut base = ctx.everyone_mask;
    for m in &ctx.role_masks {
        base |= *m;
    }
    if base.contains(Permission::ADMINISTRATOR) {
        return Permission::ALL_BITS;
    }

    // Layer 1+2: category (everyone override folded with role overrides,
    // then the member override on the category), only if the channel has one.
    if !ctx.category_overrides.is_empty() {
        base = apply_layer(base, &ctx.category_overrides, &ctx.role_ids, ctx.member_id);
    }

    // Layer 3+4+5: channel everyone/role overrides, then channel member override.
    if !ctx.channel_overrides.is_empty() {
        base = apply_layer(base, &ctx.channel_overrides, &ctx.role_ids, ctx.member_id);
    }

    base
}

/// Compute a mask with no channel at all (server-wide check, e.g. CREATE_INVITES).
pub fn compute_base(ctx: &PermissionContext) -> Permission {
    if ctx.is_server_owner {
        return Permission::ALL_BITS;
    }
    let mut base = ctx.everyone_mask;
    for m in &ctx.role_masks {
        base |= *m;
    }
    if base.contains(Permission::ADMINISTRATOR) {
        return Permission::ALL_BITS;
    }
    base
}

/// Walk a shared-item's ancestor folder chain and apply each layer's
/// overrides in order root-most → item.
/// `chain` is `[root_ancestor, ..., item]`, each entry already filtered to
/// the overrides attached to that one folder/file.
pub fn resolve_shared_item_access(
    base: Permission,
    chain: &[Vec<Override>],
    role_ids: &[uuid::Uuid],
    member_id: uuid::Uuid,
) -> Permission {
    let mut mask = base;
    for layer in chain {
        if !layer.is_empty() {
            mask = apply_layer(mask, layer, role_ids, member_id);
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx(everyone: Permission, roles: Vec<Permission>) -> PermissionContext {
        PermissionContext {
            is_server_owner: false,
            everyone_mask: everyone,
            role_masks: roles,
            role_ids: vec![],
            member_id: Uuid::nil(),
            category_overrides: vec![],
            channel_overrides: vec![],
        }
    }

    #[test]
    fn owner_gets_everything() {
        let mut c = ctx(Permission::empty(), vec![]);
        c.is_server_owner = true;
        assert_eq!(compute(&c), Permission::ALL_BITS);
    }

    #[test]
    fn administrator_role_gets_everything() {
        let c = ctx(Permission::empty(), vec![Permission::ADMINISTRATOR]);
        assert_eq!(compute(&c), Permission::ALL_BITS);
    }

    #[test]
    fn base_is_union_of_everyone_and_roles() {
        let c = ctx(Permission::READ_MESSAGES, vec![Permission::SEND_MESSAGES]);
        let mask = compute(&c);
        assert!(mask.has(Permission::READ_MESSAGES));
        assert!(mask.has(Permission::SEND_MESSAGES));
        assert!(!mask.has(Permission::MANAGE_CHANNELS));
    }

    #[test]
    fn channel_deny_then_allow_member_trumps_role() {
        let role = Uuid::new_v4();
        let member = Uuid::new_v4();
        let mut c = ctx(Permission::SEND_MESSAGES, vec![]);
        c.role_ids = vec![role];
        c.member_id = member;
        c.channel_overrides = vec![
            Override {
                target: OverrideTarget::Role,
                target_id: role,
                allow: Permission::empty(),
                deny: Permission::SEND_MESSAGES,
            },
            Override {
                target: OverrideTarget::Member,
                target_id: member,
                allow: Permission::SEND_MESSAGES,
                deny: Permission::empty(),
            },
        ];
        let mask = compute(&c);
        assert!(mask.has(Permission::SEND_MESSAGES), "member allow must trump role deny");
    }

    #[test]
    fn two_roles_same_layer_union_deny_then_union_allow() {
        let role_a = Uuid::new_v4();
        let role_b = Uuid::new_v4();
        let mut c = ctx(Permission::SEND_MESSAGES | Permission::ADD_REACTIONS, vec![]);
        c.role_ids = vec![role_a, role_b];
        c.channel_overrides = vec![
            Override { target: OverrideTarget::Role, target_id: role_a, allow: Permission::empty(), deny: Permission::SEND_MESSAGES },
            Override { target: OverrideTarget::Role, target_id: role_b, allow: Permission::SEND_MESSAGES, deny: Permission::ADD_REACTIONS },
        ];
        // union-deny = SEND_MESSAGES | ADD_REACTIONS, union-allow = SEND_MESSAGES
        // (base & !deny) | allow => SEND_MESSAGES survives via allow, ADD_REACTIONS is gone.
        let mask = compute(&c);
        assert!(mask.has(Permission::SEND_MESSAGES));
        assert!(!mask.has(Permission::ADD_REACTIONS));
    }

    #[test]
    fn empty_context_is_non_member() {
        let c = PermissionContext::empty();
        assert_eq!(compute(&c), Permission::empty());
    }

    #[test]
    fn shared_item_chain_applies_in_order() {
        let role = Uuid::new_v4();
        let g1_deny = vec![Override { target: OverrideTarget::Role, target_id: role, allow: Permission::empty(), deny: Permission::BROWSE_FILES }];
        let g2_allow = vec![Override { target: OverrideTarget::Role, target_id: role, allow: Permission::BROWSE_FILES, deny: Permission::empty() }];
        let mask = resolve_shared_item_access(
            Permission::empty(),
            &[g1_deny, g2_allow],
            &[role],
            Uuid::nil(),
        );
        assert!(mask.has(Permission::BROWSE_FILES), "subfolder allow overrides ancestor deny");
    }
}
