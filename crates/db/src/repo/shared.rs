use ecto_domain::entities::{SharedFile, SharedFolder, SharedItemPermissionOverride};
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

pub async fn get_folder(pool: &AnyPool, folder_id: Uuid) -> Result<SharedFolder> {
    sqlx::query_as::<_, SharedFolder>("SELECT * FROM shared_folders WHERE id = ?")
        .bind(folder_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::VALIDATION, "folder not found"))
}

pub async fn list_folders(pool: &AnyPool, server_id: Uuid, parent_id: Option<Uuid>) -> Result<Vec<SharedFolder>> {
    match parent_id {
        Some(parent) => sqlx::query_as::<_, SharedFolder>("SELECT * FROM shared_folders WHERE server_id = ? AND parent_id = ?")
            .bind(server_id)
            .bind(parent)
            .fetch_all(pool)
            .await
            .map_err(EctoError::database),
        None => sqlx::query_as::<_, SharedFolder>("SELECT * FROM shared_folders WHERE server_id = ? AND parent_id IS NULL")
            .bind(server_id)
            .fetch_all(pool)
            .await
            .map_err(EctoError::database),
    }
}

pub async fn create_folder(pool: &AnyPool, server_id: Uuid, parent_id: Option<Uuid>, name: &str) -> Result<SharedFolder> {
    let id = new_id();
    sqlx::query("INSERT INTO shared_folders (id, server_id, parent_id, name) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(server_id)
        .bind(parent_id)
        .bind(name)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get_folder(pool, id).await
}

/// Rejects a move that would introduce a cycle by walking the candidate
/// parent's ancestor chain looking for `folder_id`.
pub async fn move_folder(pool: &AnyPool, folder_id: Uuid, new_parent_id: Option<Uuid>) -> Result<()> {
    if let Some(candidate) = new_parent_id {
        let mut cursor = Some(candidate);
        while let Some(current) = cursor {
            if current == folder_id {
                return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "cannot move a folder into its own descendant"));
            }
            cursor = sqlx::query_scalar("SELECT parent_id FROM shared_folders WHERE id = ?")
                .bind(current)
                .fetch_optional(pool)
                .await
                .map_err(EctoError::database)?
                .flatten();
        }
    }
    sqlx::query("UPDATE shared_folders SET parent_id = ? WHERE id = ?")
        .bind(new_parent_id)
        .bind(folder_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

/// Collects every descendant folder id (not including `folder_id` itself)
/// by walking `parent_id` breadth-first, since the FK cascade that deletes
/// the rows themselves doesn't tell us which override rows to clean up.
async fn descendant_folder_ids(pool: &AnyPool, folder_id: Uuid) -> Result<Vec<Uuid>> {
    let mut all = Vec::new();
    let mut frontier = vec![folder_id];
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for parent in &frontier {
            let children: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM shared_folders WHERE parent_id = ?")
                .bind(parent)
                .fetch_all(pool)
                .await
                .map_err(EctoError::database)?;
            next.extend(children);
        }
        all.extend(next.iter().copied());
        frontier = next;
    }
    Ok(all)
}

/// Deletes a folder and, via `ON DELETE CASCADE`, every descendant folder
/// and file under it. `shared_item_permission_overrides` has no FK to
/// either table (it's a generic `item_type`/`item_id` pair), so the override
/// rows for the whole subtree are cleaned up here first.
pub async fn delete_folder(pool: &AnyPool, folder_id: Uuid) -> Result<()> {
    let mut folder_ids = descendant_folder_ids(pool, folder_id).await?;
    folder_ids.push(folder_id);

    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    for id in &folder_ids {
        let file_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM shared_files WHERE folder_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(EctoError::database)?;
        for file_id in file_ids {
            sqlx::query("DELETE FROM shared_item_permission_overrides WHERE item_type = 'file' AND item_id = ?")
                .bind(file_id)
                .execute(&mut *tx)
                .await
                .map_err(EctoError::database)?;
        }
        sqlx::query("DELETE FROM shared_item_permission_overrides WHERE item_type = 'folder' AND item_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(EctoError::database)?;
    }
    sqlx::query("DELETE FROM shared_folders WHERE id = ?")
        .bind(folder_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}

/// Every file under `folder_id` (recursively, including root-level files
/// when `folder_id` is `None`) — used to release storage quota and disk
/// bytes before/while deleting a folder subtree.
pub async fn files_in_subtree(pool: &AnyPool, server_id: Uuid, folder_id: Uuid) -> Result<Vec<SharedFile>> {
    let mut folder_ids = descendant_folder_ids(pool, folder_id).await?;
    folder_ids.push(folder_id);
    let mut files = Vec::new();
    for id in folder_ids {
        files.extend(list_files(pool, server_id, Some(id)).await?);
    }
    Ok(files)
}

pub async fn list_overrides(pool: &AnyPool, item_type: &str, item_id: Uuid) -> Result<Vec<SharedItemPermissionOverride>> {
    sqlx::query_as::<_, SharedItemPermissionOverride>(
        "SELECT * FROM shared_item_permission_overrides WHERE item_type = ? AND item_id = ?",
    )
    .bind(item_type)
    .bind(item_id)
    .fetch_all(pool)
    .await
    .map_err(EctoError::database)
}

pub async fn upsert_override(pool: &AnyPool, item_type: &str, item_id: Uuid, target_type: &str, target_id: Uuid, allow: i64, deny: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO shared_item_permission_overrides (id, item_type, item_id, target_type, target_id, allow, deny)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (item_type, item_id, target_type, target_id) DO UPDATE SET allow = excluded.allow, deny = excluded.deny",
    )
    .bind(new_id())
    .bind(item_type)
    .bind(item_id)
    .bind(target_type)
    .bind(target_id)
    .bind(allow)
    .bind(deny)
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    Ok(())
}

pub async fn delete_override(pool: &AnyPool, item_type: &str, item_id: Uuid, target_type: &str, target_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM shared_item_permission_overrides WHERE item_type = ? AND item_id = ? AND target_type = ? AND target_id = ?")
        .bind(item_type)
        .bind(item_id)
        .bind(target_type)
        .bind(target_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

pub async fn get_file(pool: &AnyPool, file_id: Uuid) -> Result<SharedFile> {
    sqlx::query_as::<_, SharedFile>("SELECT * FROM shared_files WHERE id = ?")
        .bind(file_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::VALIDATION, "file not found"))
}

pub async fn list_files(pool: &AnyPool, server_id: Uuid, folder_id: Option<Uuid>) -> Result<Vec<SharedFile>> {
    match folder_id {
        Some(folder) => sqlx::query_as::<_, SharedFile>("SELECT * FROM shared_files WHERE server_id = ? AND folder_id = ?")
            .bind(server_id)
            .bind(folder)
            .fetch_all(pool)
            .await
            .map_err(EctoError::database),
        None => sqlx::query_as::<_, SharedFile>("SELECT * FROM shared_files WHERE server_id = ? AND folder_id IS NULL")
            .bind(server_id)
            .fetch_all(pool)
            .await
            .map_err(EctoError::database),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn create_file(
    pool: &AnyPool,
    server_id: Uuid,
    folder_id: Option<Uuid>,
    filename: &str,
    url: &str,
    content_type: Option<&str>,
    size_bytes: i64,
    uploaded_by: Uuid,
) -> Result<SharedFile> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO shared_files (id, server_id, folder_id, filename, url, content_type, size_bytes, uploaded_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(server_id)
    .bind(folder_id)
    .bind(filename)
    .bind(url)
    .bind(content_type)
    .bind(size_bytes)
    .bind(uploaded_by)
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    get_file(pool, id).await
}

pub async fn total_storage_used(pool: &AnyPool, server_id: Uuid) -> Result<i64> {
    sqlx::query_scalar("SELECT COALESCE(SUM(size_bytes), 0) FROM shared_files WHERE server_id = ?")
        .bind(server_id)
        .fetch_one(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn delete_file(pool: &AnyPool, file_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    sqlx::query("DELETE FROM shared_item_permission_overrides WHERE item_type = 'file' AND item_id = ?")
        .bind(file_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    sqlx::query("DELETE FROM shared_files WHERE id = ?")
        .bind(file_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}
