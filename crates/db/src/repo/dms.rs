use ecto_domain::entities::{DmConversation, Message, MessageType, ReactionAction};
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

pub async fn open(pool: &AnyPool, server_id: Uuid, a: Uuid, b: Uuid) -> Result<DmConversation> {
    let (user_a, user_b) = DmConversation::canonical_pair(a, b);
    let existing = sqlx::query_as::<_, DmConversation>(
        "SELECT * FROM dm_conversations WHERE server_id = ? AND user_a = ? AND user_b = ?",
    )
    .bind(server_id)
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(pool)
    .await
    .map_err(EctoError::database)?;

    if let Some(conv) = existing {
        return Ok(conv);
    }

    let id = new_id();
    sqlx::query("INSERT INTO dm_conversations (id, server_id, user_a, user_b) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(server_id)
        .bind(user_a)
        .bind(user_b)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;

    sqlx::query_as::<_, DmConversation>("SELECT * FROM dm_conversations WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn list_for_user(pool: &AnyPool, server_id: Uuid, user_id: Uuid) -> Result<Vec<DmConversation>> {
    sqlx::query_as::<_, DmConversation>(
        "SELECT * FROM dm_conversations WHERE server_id = ? AND (user_a = ? OR user_b = ?) ORDER BY last_message_at DESC NULLS LAST",
    )
    .bind(server_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(EctoError::database)
}

pub async fn get(pool: &AnyPool, conversation_id: Uuid) -> Result<DmConversation> {
    sqlx::query_as::<_, DmConversation>("SELECT * FROM dm_conversations WHERE id = ?")
        .bind(conversation_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::DM_NOT_FOUND, "conversation not found"))
}

/// `conversation_id` doubles as the pseudo-channel key for message storage:
/// DM messages live in the same `messages` table, keyed by conversation id.
pub async fn send(pool: &AnyPool, conversation_id: Uuid, author_id: Uuid, content: &str) -> Result<Message> {
    let id = new_id();
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    sqlx::query(
        "INSERT INTO messages (id, channel_id, author_id, content, message_type) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(conversation_id)
    .bind(author_id)
    .bind(content)
    .bind(MessageType::Default)
    .execute(&mut *tx)
    .await
    .map_err(EctoError::database)?;
    sqlx::query("UPDATE dm_conversations SET last_message_at = ? WHERE id = ?")
        .bind(chrono::Utc::now())
        .bind(conversation_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    tx.commit().await.map_err(EctoError::database)?;

    sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn history(pool: &AnyPool, conversation_id: Uuid, before: Option<Uuid>, limit: i64) -> Result<Vec<Message>> {
    if let Some(before_id) = before {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE channel_id = ? AND deleted = FALSE
               AND created_at < (SELECT created_at FROM messages WHERE id = ?)
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(conversation_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
    } else {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE channel_id = ? AND deleted = FALSE ORDER BY created_at DESC LIMIT ?",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
    }
}

pub async fn edit(pool: &AnyPool, message_id: Uuid, content: &str) -> Result<Message> {
    sqlx::query("UPDATE messages SET content = ?, edited_at = ? WHERE id = ?")
        .bind(content)
        .bind(chrono::Utc::now())
        .bind(message_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
        .bind(message_id)
        .fetch_one(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn delete(pool: &AnyPool, message_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE messages SET deleted = TRUE WHERE id = ?")
        .bind(message_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

pub async fn react(pool: &AnyPool, message_id: Uuid, user_id: Uuid, emoji: &str, action: ReactionAction) -> Result<()> {
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
    Ok(())
}

pub async fn mark_read(pool: &AnyPool, user_id: Uuid, conversation_id: Uuid, last_read_message_id: Uuid) -> Result<()> {
    sqlx::query(
        "INSERT INTO dm_read_states (user_id, conversation_id, last_read_message_id) VALUES (?, ?, ?)
         ON CONFLICT (user_id, conversation_id) DO UPDATE SET last_read_message_id = excluded.last_read_message_id",
    )
    .bind(user_id)
    .bind(conversation_id)
    .bind(last_read_message_id)
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    Ok(())
}
