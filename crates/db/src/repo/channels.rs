use ecto_domain::entities::{Channel, ChannelType, PermissionOverrideRow};
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

pub async fn get(pool: &AnyPool, channel_id: Uuid) -> Result<Channel> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = ?")
        .bind(channel_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::CHANNEL_NOT_FOUND, "channel not found"))
}

pub async fn list_for_server(pool: &AnyPool, server_id: Uuid) -> Result<Vec<Channel>> {
    sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE server_id = ? ORDER BY position")
        .bind(server_id)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &AnyPool,
    server_id: Uuid,
    category_id: Option<Uuid>,
    name: &str,
    kind: ChannelType,
    position: i32,
) -> Result<Channel> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO channels (id, server_id, category_id, name, kind, position) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(server_id)
    .bind(category_id)
    .bind(name)
    .bind(kind)
    .bind(position)
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    get(pool, id).await
}

pub async fn update(pool: &AnyPool, channel_id: Uuid, name: Option<&str>, topic: Option<&str>, slowmode_seconds: Option<i32>, nsfw: Option<bool>) -> Result<Channel> {
    let current = get(pool, channel_id).await?;
    sqlx::query("UPDATE channels SET name = ?, topic = ?, slowmode_seconds = ?, nsfw = ? WHERE id = ?")
        .bind(name.unwrap_or(&current.name))
        .bind(topic.or(current.topic.as_deref()))
        .bind(slowmode_seconds.unwrap_or(current.slowmode_seconds))
        .bind(nsfw.unwrap_or(current.nsfw))
        .bind(channel_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get(pool, channel_id).await
}

/// `messages.channel_id` has no FK (it's shared with DM conversations), so
/// channel deletion has to sweep its message history explicitly — deleting
/// those rows cascades to their attachments/reactions via the FK on
/// `messages.id`.
pub async fn delete(pool: &AnyPool, channel_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    sqlx::query("DELETE FROM messages WHERE channel_id = ?")
        .bind(channel_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    sqlx::query("DELETE FROM channels WHERE id = ?")
        .bind(channel_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}

pub async fn reorder(pool: &AnyPool, ordered_ids: &[Uuid]) -> Result<()> {
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    for (position, id) in ordered_ids.iter().enumerate() {
        sqlx::query("UPDATE channels SET position = ? WHERE id = ?")
            .bind(position as i32)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(EctoError::database)?;
    }
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}

pub async fn list_overrides(pool: &AnyPool, channel_id: Uuid) -> Result<Vec<PermissionOverrideRow>> {
    sqlx::query_as::<_, PermissionOverrideRow>(
        "SELECT id, target_type, target_id, allow, deny FROM channel_permission_overrides WHERE channel_id = ?",
    )
    .bind(channel_id)
    .fetch_all(pool)
    .await
    .map_err(EctoError::database)
}

pub async fn upsert_override(pool: &AnyPool, channel_id: Uuid, target_type: &str, target_id: Uuid, allow: i64, deny: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO channel_permission_overrides (id, channel_id, target_type, target_id, allow, deny)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (channel_id, target_type, target_id) DO UPDATE SET allow = excluded.allow, deny = excluded.deny",
    )
    .bind(new_id())
    .bind(channel_id)
    .bind(target_type)
    .bind(target_id)
    .bind(allow)
    .bind(deny)
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    Ok(())
}

pub async fn delete_override(pool: &AnyPool, channel_id: Uuid, target_type: &str, target_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM channel_permission_overrides WHERE channel_id = ? AND target_type = ? AND target_id = ?")
        .bind(channel_id)
        .bind(target_type)
        .bind(target_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}
