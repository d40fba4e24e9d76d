use ecto_domain::permissions::{Override, OverrideTarget, PermissionContext};
use ecto_domain::Result;
use sqlx::AnyPool;
use std::collections::HashMap;
use uuid::Uuid;

struct OverrideRow {
    target_type: String,
    target_id: Uuid,
    allow: i64,
    deny: i64,
}

fn to_override(row: OverrideRow) -> Override {
    Override {
        target: if row.target_type == "role" { OverrideTarget::Role } else { OverrideTarget::Member },
        target_id: row.target_id,
        allow: ecto_domain::permissions::Permission::from_bits_truncate(row.allow as u64),
        deny: ecto_domain::permissions::Permission::from_bits_truncate(row.deny as u64),
    }
}

/// Builds the [`PermissionContext`] for one `(user, channel)` pair.
///
/// Four round trips: owner bit, member row, roles/overrides in parallel
/// would be the batch-optimized shape; this single-subject path folds them
/// into a handful of sequential queries since there's only one member to
/// resolve and the extra round trips are cheap relative to the join
/// complexity of combining them.
pub async fn build_context(pool: &AnyPool, server_id: Uuid, user_id: Uuid, channel_id: Option<Uuid>) -> Result<PermissionContext> {
    let owner_id: Option<Uuid> = sqlx::query_scalar("SELECT admin_user_id FROM servers WHERE id = ?")
        .bind(server_id)
        .fetch_optional(pool)
        .await
        .map_err(ecto_domain::EctoError::database)?;

    let Some(owner_id) = owner_id else {
        return Err(ecto_domain::EctoError::not_found(ecto_domain::error::codes::SERVER_NOT_FOUND, "server not found"));
    };

    let member_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM members WHERE server_id = ? AND user_id = ?")
        .bind(server_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(ecto_domain::EctoError::database)?;

    let Some(member_id) = member_id else {
        return Ok(PermissionContext::empty());
    };

    let role_rows: Vec<(Uuid, i64, bool)> = sqlx::query_as(
        "SELECT r.id, r.permissions, r.is_default
         FROM roles r
         JOIN member_roles mr ON mr.role_id = r.id
         WHERE mr.member_id = ?",
    )
    .bind(member_id)
    .fetch_all(pool)
    .await
    .map_err(ecto_domain::EctoError::database)?;

    let mut everyone_mask = ecto_domain::permissions::Permission::empty();
    let mut role_masks = Vec::new();
    let mut role_ids = Vec::new();
    for (role_id, perms, is_default) in role_rows {
        let mask = ecto_domain::permissions::Permission::from_bits_truncate(perms as u64);
        role_ids.push(role_id);
        if is_default {
            everyone_mask = mask;
        } else {
            role_masks.push(mask);
        }
    }

    let mut ctx = PermissionContext {
        is_server_owner: owner_id == user_id,
        everyone_mask,
        role_masks,
        role_ids,
        member_id,
        category_overrides: vec![],
        channel_overrides: vec![],
    };

    if let Some(channel_id) = channel_id {
        let category_id: Option<Uuid> = sqlx::query_scalar("SELECT category_id FROM channels WHERE id = ?")
            .bind(channel_id)
            .fetch_optional(pool)
            .await
            .map_err(ecto_domain::EctoError::database)?
            .flatten();

        if let Some(category_id) = category_id {
            ctx.category_overrides = fetch_overrides(
                pool,
                "SELECT target_type, target_id, allow, deny FROM category_permission_overrides WHERE category_id = ?",
                category_id,
            )
            .await?;
        }

        ctx.channel_overrides = fetch_overrides(
            pool,
            "SELECT target_type, target_id, allow, deny FROM channel_permission_overrides WHERE channel_id = ?",
            channel_id,
        )
        .await?;
    }

    Ok(ctx)
}

async fn fetch_overrides(pool: &AnyPool, sql: &str, id: Uuid) -> Result<Vec<Override>> {
    let rows: Vec<(String, Uuid, i64, i64)> = sqlx::query_as(sql)
        .bind(id)
        .fetch_all(pool)
        .await
        .map_err(ecto_domain::EctoError::database)?;
    Ok(rows
        .into_iter()
        .map(|(target_type, target_id, allow, deny)| to_override(OverrideRow { target_type, target_id, allow, deny }))
        .collect())
}

/// Batch variant for a membership list view: one [`PermissionContext`] per
/// channel, sharing the member/role lookups across the whole channel set.
///
/// Four round trips total, independent of `channel_ids.len()`: (1) owner bit
/// + member row (folded into `build_context(.., None)`'s two queries), (2)
/// channel→category map for the whole id set, (3) channel overrides for the
/// whole id set, (4) category overrides for the distinct category-id set.
pub async fn build_batch_context(pool: &AnyPool, server_id: Uuid, user_id: Uuid, channel_ids: &[Uuid]) -> Result<HashMap<Uuid, PermissionContext>> {
    let base = build_context(pool, server_id, user_id, None).await?;
    let mut out = HashMap::with_capacity(channel_ids.len());
    if base.is_server_owner || channel_ids.is_empty() {
        for &channel_id in channel_ids {
            out.insert(channel_id, base.clone());
        }
        return Ok(out);
    }

    let placeholders = std::iter::repeat("?").take(channel_ids.len()).collect::<Vec<_>>().join(",");

    let category_map_sql = format!("SELECT id, category_id FROM channels WHERE id IN ({placeholders})");
    let mut q = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(&category_map_sql);
    for &id in channel_ids {
        q = q.bind(id);
    }
    let category_rows = q.fetch_all(pool).await.map_err(ecto_domain::EctoError::database)?;
    let channel_to_category: HashMap<Uuid, Option<Uuid>> = category_rows.into_iter().collect();

    let channel_ov_sql = format!(
        "SELECT channel_id, target_type, target_id, allow, deny FROM channel_permission_overrides WHERE channel_id IN ({placeholders})"
    );
    let mut q = sqlx::query_as::<_, (Uuid, String, Uuid, i64, i64)>(&channel_ov_sql);
    for &id in channel_ids {
        q = q.bind(id);
    }
    let channel_ov_rows = q.fetch_all(pool).await.map_err(ecto_domain::EctoError::database)?;
    let mut channel_overrides_by_channel: HashMap<Uuid, Vec<Override>> = HashMap::new();
    for (channel_id, target_type, target_id, allow, deny) in channel_ov_rows {
        channel_overrides_by_channel
            .entry(channel_id)
            .or_default()
            .push(to_override(OverrideRow { target_type, target_id, allow, deny }));
    }

    let category_ids: Vec<Uuid> = channel_to_category.values().filter_map(|c| *c).collect::<std::collections::HashSet<_>>().into_iter().collect();
    let mut category_overrides_by_category: HashMap<Uuid, Vec<Override>> = HashMap::new();
    if !category_ids.is_empty() {
        let cat_placeholders = std::iter::repeat("?").take(category_ids.len()).collect::<Vec<_>>().join(",");
        let cat_ov_sql = format!(
            "SELECT category_id, target_type, target_id, allow, deny FROM category_permission_overrides WHERE category_id IN ({cat_placeholders})"
        );
        let mut q = sqlx::query_as::<_, (Uuid, String, Uuid, i64, i64)>(&cat_ov_sql);
        for &id in &category_ids {
            q = q.bind(id);
        }
        let cat_ov_rows = q.fetch_all(pool).await.map_err(ecto_domain::EctoError::database)?;
        for (category_id, target_type, target_id, allow, deny) in cat_ov_rows {
            category_overrides_by_category
                .entry(category_id)
                .or_default()
                .push(to_override(OverrideRow { target_type, target_id, allow, deny }));
        }
    }

    for &channel_id in channel_ids {
        let mut ctx = base.clone();
        ctx.channel_overrides = channel_overrides_by_channel.get(&channel_id).cloned().unwrap_or_default();
        if let Some(Some(category_id)) = channel_to_category.get(&channel_id) {
            ctx.category_overrides = category_overrides_by_category.get(category_id).cloned().unwrap_or_default();
        }
        out.insert(channel_id, ctx);
    }
    Ok(out)
}

/// Walks a shared item's ancestor chain (root-most first) and fetches the
/// override layer attached to each folder, plus the item itself if it is a
/// file (folders are covered by the chain itself).
pub async fn shared_item_override_chain(pool: &AnyPool, item_type: &str, item_id: Uuid, folder_id: Option<Uuid>) -> Result<Vec<Vec<Override>>> {
    let mut ancestors = Vec::new();
    let mut cursor = folder_id;
    while let Some(folder) = cursor {
        ancestors.push(folder);
        cursor = sqlx::query_scalar("SELECT parent_id FROM shared_folders WHERE id = ?")
            .bind(folder)
            .fetch_optional(pool)
            .await
            .map_err(ecto_domain::EctoError::database)?
            .flatten();
    }
    ancestors.reverse();

    let mut chain = Vec::with_capacity(ancestors.len() + 1);
    for folder in ancestors {
        chain.push(
            fetch_overrides(
                pool,
                "SELECT target_type, target_id, allow, deny FROM shared_item_permission_overrides WHERE item_type = 'folder' AND item_id = ?",
                folder,
            )
            .await?,
        );
    }
    if item_type == "file" {
        chain.push(
            fetch_overrides(
                pool,
                "SELECT target_type, target_id, allow, deny FROM shared_item_permission_overrides WHERE item_type = 'file' AND item_id = ?",
                item_id,
            )
            .await?,
        );
    }
    Ok(chain)
}
