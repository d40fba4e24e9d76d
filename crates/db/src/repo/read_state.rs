use ecto_domain::entities::ReadState;
use ecto_domain::{EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

/// Every read-state row for a user across this server's channels, for the
/// `system.ready` bootstrap snapshot.
pub async fn list_for_user(pool: &AnyPool, server_id: Uuid, user_id: Uuid) -> Result<Vec<ReadState>> {
    sqlx::query_as::<_, ReadState>(
        "SELECT rs.* FROM read_states rs
         JOIN channels c ON c.id = rs.channel_id
         WHERE c.server_id = ? AND rs.user_id = ?",
    )
    .bind(server_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(EctoError::database)
}

/// Marks `channel_id` read up to `message_id` for `user_id`, clearing the
/// mention counter. Upserts since a user's first read of a channel has no
/// prior row.
pub async fn mark_read(pool: &AnyPool, channel_id: Uuid, user_id: Uuid, message_id: Uuid) -> Result<()> {
    sqlx::query(
        "INSERT INTO read_states (user_id, channel_id, last_read_message_id, mention_count)
         VALUES (?, ?, ?, 0)
         ON CONFLICT (user_id, channel_id) DO UPDATE SET last_read_message_id = excluded.last_read_message_id, mention_count = 0",
    )
    .bind(user_id)
    .bind(channel_id)
    .bind(message_id)
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    Ok(())
}

/// Bumps the mention counter for every user named in a just-sent message's
/// mention set, without touching `last_read_message_id`.
pub async fn bump_mentions(pool: &AnyPool, channel_id: Uuid, user_ids: &[Uuid]) -> Result<()> {
    if user_ids.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    for user_id in user_ids {
        sqlx::query(
            "INSERT INTO read_states (user_id, channel_id, mention_count) VALUES (?, ?, 1)
             ON CONFLICT (user_id, channel_id) DO UPDATE SET mention_count = read_states.mention_count + 1",
        )
        .bind(user_id)
        .bind(channel_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    }
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}

pub async fn mention_count(pool: &AnyPool, channel_id: Uuid, user_id: Uuid) -> Result<i64> {
    sqlx::query_scalar("SELECT mention_count FROM read_states WHERE channel_id = ? AND user_id = ?")
        .bind(channel_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)
        .map(|row| row.unwrap_or(0))
}
