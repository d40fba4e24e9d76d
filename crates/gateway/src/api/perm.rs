//! Permission-check helpers shared by every RPC handler. Thin glue over
//! `ecto_db::permissions` + `ecto_domain::permissions` — handlers call
//! `require_channel` / `require_server` rather than building contexts by
//! hand.

use ecto_domain::permissions::Permission;
use ecto_domain::trace::TraceEvent;
use ecto_domain::{EctoError, Result};
use uuid::Uuid;

use crate::state::AppState;

pub async fn effective_mask_for_channel(state: &AppState, user_id: Uuid, channel_id: Uuid) -> Result<Permission> {
    let ctx = ecto_db::permissions::build_context(&state.db, state.server_id, user_id, Some(channel_id)).await?;
    Ok(ecto_domain::permissions::compute(&ctx))
}

pub async fn effective_mask_server_wide(state: &AppState, user_id: Uuid) -> Result<Permission> {
    let ctx = ecto_db::permissions::build_context(&state.db, state.server_id, user_id, None).await?;
    Ok(ecto_domain::permissions::compute_base(&ctx))
}

pub async fn require_channel(state: &AppState, user_id: Uuid, channel_id: Uuid, bit: Permission) -> Result<Permission> {
    let mask = effective_mask_for_channel(state, user_id, channel_id).await?;
    if !mask.has(bit) {
        TraceEvent::PermissionDenied { actor_id: user_id.to_string(), channel_id: Some(channel_id.to_string()), required: format!("{bit:?}") }.emit();
        return Err(EctoError::Forbidden);
    }
    Ok(mask)
}

pub async fn require_server(state: &AppState, user_id: Uuid, bit: Permission) -> Result<Permission> {
    let mask = effective_mask_server_wide(state, user_id).await?;
    if !mask.has(bit) {
        TraceEvent::PermissionDenied { actor_id: user_id.to_string(), channel_id: None, required: format!("{bit:?}") }.emit();
        return Err(EctoError::Forbidden);
    }
    Ok(mask)
}

/// Effective mask for a shared folder/file: base server-wide mask, folded
/// through the ancestor-folder override chain root-most first.
pub async fn effective_mask_for_shared_item(
    state: &AppState,
    user_id: Uuid,
    item_type: &str,
    item_id: Uuid,
    folder_id: Option<Uuid>,
) -> Result<Permission> {
    let ctx = ecto_db::permissions::build_context(&state.db, state.server_id, user_id, None).await?;
    if ctx.is_server_owner {
        return Ok(Permission::ALL_BITS);
    }
    let base = ecto_domain::permissions::compute_base(&ctx);
    let chain = ecto_db::permissions::shared_item_override_chain(&state.db, item_type, item_id, folder_id).await?;
    Ok(ecto_domain::permissions::resolve_shared_item_access(base, &chain, &ctx.role_ids, ctx.member_id))
}

pub async fn require_shared_item(
    state: &AppState,
    user_id: Uuid,
    item_type: &str,
    item_id: Uuid,
    folder_id: Option<Uuid>,
    bit: Permission,
) -> Result<Permission> {
    let mask = effective_mask_for_shared_item(state, user_id, item_type, item_id, folder_id).await?;
    if !mask.has(bit) {
        TraceEvent::PermissionDenied { actor_id: user_id.to_string(), channel_id: None, required: format!("{bit:?}") }.emit();
        return Err(EctoError::Forbidden);
    }
    Ok(mask)
}

/// Role-hierarchy check for kick/ban: the actor must outrank the target,
/// unless the actor is the server owner.
pub async fn require_outranks(state: &AppState, actor_is_owner: bool, actor_id: Uuid, target_member_id: Uuid) -> Result<()> {
    if actor_is_owner {
        return Ok(());
    }
    let actor_member = ecto_db::repo::members::get(&state.db, state.server_id, actor_id).await?;
    let actor_rank = ecto_db::repo::members::role_position_rank(&state.db, actor_member.id).await?;
    let target_rank = ecto_db::repo::members::role_position_rank(&state.db, target_member_id).await?;
    if actor_rank <= target_rank {
        return Err(EctoError::Hierarchy("insufficient role position".into()));
    }
    Ok(())
}
