use ecto_domain::entities::{PageContent, PageRevision};
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

pub async fn get(pool: &AnyPool, channel_id: Uuid) -> Result<PageContent> {
    sqlx::query_as::<_, PageContent>("SELECT * FROM page_contents WHERE channel_id = ?")
        .bind(channel_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::CHANNEL_NOT_FOUND, "page not found"))
}

pub async fn create_empty(pool: &AnyPool, channel_id: Uuid) -> Result<()> {
    sqlx::query("INSERT INTO page_contents (channel_id) VALUES (?)")
        .bind(channel_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

/// Optimistic-concurrency update: aborts with a conflict if `expected_version`
/// no longer matches the stored version. Snapshots the pre-update row into
/// `page_revisions` before bumping. Relies on the transaction's isolation
/// level (set at pool connect time) rather than an explicit row lock, since
/// `SELECT ... FOR UPDATE` has no SQLite equivalent.
pub async fn update_content(pool: &AnyPool, channel_id: Uuid, content: &str, expected_version: i32, edited_by: Uuid) -> Result<PageContent> {
    let mut tx = pool.begin().await.map_err(EctoError::database)?;

    let current = sqlx::query_as::<_, PageContent>("SELECT * FROM page_contents WHERE channel_id = ?")
        .bind(channel_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::CHANNEL_NOT_FOUND, "page not found"))?;

    if current.version != expected_version {
        return Err(EctoError::conflict(ecto_domain::error::codes::PAGE_VERSION_CONFLICT, "page was edited concurrently"));
    }

    sqlx::query("INSERT INTO page_revisions (id, channel_id, content, version, edited_by) VALUES (?, ?, ?, ?, ?)")
        .bind(new_id())
        .bind(channel_id)
        .bind(&current.content)
        .bind(current.version)
        .bind(current.edited_by)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;

    sqlx::query("UPDATE page_contents SET content = ?, version = version + 1, edited_by = ?, edited_at = ? WHERE channel_id = ?")
        .bind(content)
        .bind(edited_by)
        .bind(chrono::Utc::now())
        .bind(channel_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;

    tx.commit().await.map_err(EctoError::database)?;
    get(pool, channel_id).await
}

pub async fn set_banner(pool: &AnyPool, channel_id: Uuid, banner_url: &str) -> Result<PageContent> {
    sqlx::query("UPDATE page_contents SET banner_url = ? WHERE channel_id = ?")
        .bind(banner_url)
        .bind(channel_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get(pool, channel_id).await
}

pub async fn list_revisions(pool: &AnyPool, channel_id: Uuid, limit: i64) -> Result<Vec<PageRevision>> {
    sqlx::query_as::<_, PageRevision>("SELECT * FROM page_revisions WHERE channel_id = ? ORDER BY version DESC LIMIT ?")
        .bind(channel_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}
