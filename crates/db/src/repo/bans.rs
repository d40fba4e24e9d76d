use ecto_domain::entities::{Ban, DeleteMessagesWindow};
use ecto_domain::{EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

pub async fn get(pool: &AnyPool, server_id: Uuid, user_id: Uuid) -> Result<Option<Ban>> {
    sqlx::query_as::<_, Ban>("SELECT * FROM bans WHERE server_id = ? AND user_id = ?")
        .bind(server_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn list(pool: &AnyPool, server_id: Uuid) -> Result<Vec<Ban>> {
    sqlx::query_as::<_, Ban>("SELECT * FROM bans WHERE server_id = ? ORDER BY created_at DESC")
        .bind(server_id)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}

/// Inserts the ban row and, if `delete_messages` is set, soft-deletes the
/// user's messages across the server newer than the chosen window. Runs in
/// the caller's transaction.
pub async fn create(
    tx: &mut sqlx::Transaction<'_, sqlx::Any>,
    server_id: Uuid,
    user_id: Uuid,
    banned_by: Uuid,
    reason: Option<&str>,
    delete_messages: Option<DeleteMessagesWindow>,
) -> Result<()> {
    sqlx::query("INSERT INTO bans (server_id, user_id, banned_by, reason) VALUES (?, ?, ?, ?)")
        .bind(server_id)
        .bind(user_id)
        .bind(banned_by)
        .bind(reason)
        .execute(&mut **tx)
        .await
        .map_err(EctoError::database)?;

    if let Some(window) = delete_messages {
        let cutoff = chrono::Utc::now() - window.as_duration();
        sqlx::query(
            "UPDATE messages SET deleted = TRUE
             WHERE author_id = ? AND created_at >= ? AND deleted = FALSE
               AND channel_id IN (SELECT id FROM channels WHERE server_id = ?)",
        )
        .bind(user_id)
        .bind(cutoff)
        .bind(server_id)
        .execute(&mut **tx)
        .await
        .map_err(EctoError::database)?;
    }
    Ok(())
}

pub async fn delete(pool: &AnyPool, server_id: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM bans WHERE server_id = ? AND user_id = ?")
        .bind(server_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}
