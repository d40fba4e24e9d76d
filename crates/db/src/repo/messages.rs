use ecto_domain::entities::{Attachment, Message, MessageType, ReactionAction};
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

/// Records an uploaded file before it's bound to a message. `message_id`
/// stays null until [`bind_attachments`] runs inside the same transaction
/// as the message insert. `id` is generated by the caller (the gateway's
/// upload handler needs it up front to place the file at its final disk
/// path before the row exists).
pub async fn create_attachment(
    pool: &AnyPool,
    id: Uuid,
    filename: &str,
    url: &str,
    content_type: Option<&str>,
    size_bytes: i64,
) -> Result<Attachment> {
    sqlx::query("INSERT INTO attachments (id, filename, url, content_type, size_bytes) VALUES (?, ?, ?, ?, ?)")
        .bind(id)
        .bind(filename)
        .bind(url)
        .bind(content_type)
        .bind(size_bytes)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(Attachment { id, message_id: None, filename: filename.to_string(), url: url.to_string(), content_type: content_type.map(str::to_string), size_bytes })
}

/// Sum of `size_bytes` across every attachment uploaded so far, bound or
/// not — used for the global non-image storage quota check on `/upload`
/// and `/dm/upload` (shared-file uploads have their own quota, see
/// `ecto_db::repo::shared::total_storage_used`).
pub async fn total_attachment_storage_used(pool: &AnyPool) -> Result<i64> {
    sqlx::query_scalar("SELECT COALESCE(SUM(size_bytes), 0) FROM attachments")
        .fetch_one(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn get_attachments_for_message(pool: &AnyPool, message_id: Uuid) -> Result<Vec<Attachment>> {
    sqlx::query_as::<_, Attachment>("SELECT * FROM attachments WHERE message_id = ?")
        .bind(message_id)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn get(pool: &AnyPool, message_id: Uuid) -> Result<Message> {
    sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
        .bind(message_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::MESSAGE_NOT_FOUND, "message not found"))
}

/// The author's latest non-deleted message in the channel, used for the
/// slowmode check. `None` means slowmode never applies.
pub async fn last_by_author(pool: &AnyPool, channel_id: Uuid, author_id: Uuid) -> Result<Option<Message>> {
    sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE channel_id = ? AND author_id = ? AND deleted = FALSE ORDER BY created_at DESC LIMIT 1",
    )
    .bind(channel_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await
    .map_err(EctoError::database)
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &AnyPool,
    channel_id: Uuid,
    author_id: Uuid,
    content: Option<&str>,
    kind: MessageType,
    reply_to: Option<Uuid>,
    mention_everyone: bool,
    mention_roles: &[Uuid],
    mention_users: &[Uuid],
    webhook_id: Option<Uuid>,
) -> Result<Message> {
    let id = new_id();
    let mention_roles_json = serde_json::to_string(mention_roles).expect("uuid slice always serializes");
    let mention_users_json = serde_json::to_string(mention_users).expect("uuid slice always serializes");
    sqlx::query(
        "INSERT INTO messages (id, channel_id, author_id, content, message_type, reply_to,
                                mention_everyone, mention_roles, mention_users, webhook_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(channel_id)
    .bind(author_id)
    .bind(content)
    .bind(kind)
    .bind(reply_to)
    .bind(mention_everyone)
    .bind(mention_roles_json)
    .bind(mention_users_json)
    .bind(webhook_id)
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    get(pool, id).await
}

pub async fn bind_attachments(pool: &AnyPool, message_id: Uuid, attachment_ids: &[Uuid]) -> Result<()> {
    if attachment_ids.is_empty() {
        return Ok(());
    }
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    for attachment_id in attachment_ids {
        sqlx::query("UPDATE attachments SET message_id = ? WHERE id = ?")
            .bind(message_id)
            .bind(attachment_id)
            .execute(&mut *tx)
            .await
            .map_err(EctoError::database)?;
    }
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}

pub async fn update_content(pool: &AnyPool, message_id: Uuid, content: &str) -> Result<Message> {
    sqlx::query("UPDATE messages SET content = ?, edited_at = ? WHERE id = ?")
        .bind(content)
        .bind(chrono::Utc::now())
        .bind(message_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get(pool, message_id).await
}

pub async fn soft_delete(pool: &AnyPool, message_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    soft_delete_tx(&mut tx, message_id).await?;
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}

/// Same as [`soft_delete`], but inside a transaction the caller already
/// holds — used by the message-delete handler so the delete and the audit
/// log insert commit or abort together.
pub async fn soft_delete_tx(tx: &mut sqlx::Transaction<'_, sqlx::Any>, message_id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE messages SET deleted = TRUE WHERE id = ? AND deleted = FALSE")
        .bind(message_id)
        .execute(&mut **tx)
        .await
        .map_err(EctoError::database)?;
    if result.rows_affected() == 0 {
        return Err(EctoError::not_found(ecto_domain::error::codes::MESSAGE_NOT_FOUND, "message not found"));
    }
    Ok(())
}

pub async fn set_pinned(pool: &AnyPool, message_id: Uuid, pinned: bool) -> Result<()> {
    sqlx::query("UPDATE messages SET pinned = ? WHERE id = ?")
        .bind(pinned)
        .bind(message_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

/// Idempotent: relies on the `(message_id, user_id, emoji)` primary key to
/// make a repeated add a no-op instead of an error.
pub async fn react(pool: &AnyPool, message_id: Uuid, user_id: Uuid, emoji: &str, action: ReactionAction) -> Result<i64> {
    match action {
        ReactionAction::Add => {
            sqlx::query("INSERT INTO reactions (message_id, user_id, emoji) VALUES (?, ?, ?) ON CONFLICT DO NOTHING")
                .bind(message_id)
                .bind(user_id)
                .bind(emoji)
                .execute(pool)
                .await
                .map_err(EctoError::database)?;
        }
        ReactionAction::Remove => {
            sqlx::query("DELETE FROM reactions WHERE message_id = ? AND user_id = ? AND emoji = ?")
                .bind(message_id)
                .bind(user_id)
                .bind(emoji)
                .execute(pool)
                .await
                .map_err(EctoError::database)?;
        }
    }
    sqlx::query_scalar("SELECT COUNT(*) FROM reactions WHERE message_id = ? AND emoji = ?")
        .bind(message_id)
        .bind(emoji)
        .fetch_one(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn list_pinned(pool: &AnyPool, channel_id: Uuid) -> Result<Vec<Message>> {
    sqlx::query_as::<_, Message>(
        "SELECT * FROM messages WHERE channel_id = ? AND pinned = TRUE AND deleted = FALSE ORDER BY created_at DESC",
    )
    .bind(channel_id)
    .fetch_all(pool)
    .await
    .map_err(EctoError::database)
}

pub async fn list_for_channel(pool: &AnyPool, channel_id: Uuid, before: Option<Uuid>, limit: i64) -> Result<Vec<Message>> {
    if let Some(before_id) = before {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE channel_id = ? AND deleted = FALSE
               AND created_at < (SELECT created_at FROM messages WHERE id = ?)
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(channel_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
    } else {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE channel_id = ? AND deleted = FALSE ORDER BY created_at DESC LIMIT ?",
        )
        .bind(channel_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
    }
}
