use ecto_domain::entities::Message;
use ecto_domain::{config::DatabaseBackend, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

/// Full-text search over one channel's messages. Postgres uses
/// `plainto_tsquery` against a `content` cast to `tsvector` (no materialized
/// column — traffic is low enough per-tenant that an index isn't worth the
/// write-path cost); SQLite falls back to a `LIKE` scan, which is adequate
/// at single-tenant scale.
pub async fn search_channel(pool: &AnyPool, backend: DatabaseBackend, channel_id: Uuid, query: &str, limit: i64) -> Result<Vec<Message>> {
    match backend {
        DatabaseBackend::Postgres => sqlx::query_as::<_, Message>(
            "SELECT * FROM messages
             WHERE channel_id = ? AND deleted = FALSE
               AND to_tsvector('english', COALESCE(content, '')) @@ plainto_tsquery('english', ?)
             ORDER BY ts_rank(to_tsvector('english', COALESCE(content, '')), plainto_tsquery('english', ?)) DESC, created_at DESC
             LIMIT ?",
        )
        .bind(channel_id)
        .bind(query)
        .bind(query)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database),
        DatabaseBackend::Sqlite => {
            let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
            sqlx::query_as::<_, Message>(
                "SELECT * FROM messages
                 WHERE channel_id = ? AND deleted = FALSE AND content LIKE ? ESCAPE '\\'
                 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(channel_id)
            .bind(pattern)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(EctoError::database)
        }
    }
}
