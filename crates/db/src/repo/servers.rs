use ecto_domain::entities::{Category, Server, ServerConfig};
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

pub async fn get(pool: &AnyPool, server_id: Uuid) -> Result<Server> {
    sqlx::query_as::<_, Server>("SELECT * FROM servers WHERE id = ?")
        .bind(server_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::SERVER_NOT_FOUND, "server not found"))
}

pub async fn get_config(pool: &AnyPool, server_id: Uuid) -> Result<ServerConfig> {
    sqlx::query_as::<_, ServerConfig>("SELECT * FROM server_configs WHERE server_id = ?")
        .bind(server_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::SERVER_NOT_FOUND, "server config not found"))
}

/// Bootstraps the singleton server row the first time the process starts
/// with an empty database. `setup_complete` stays false until the first
/// member joins and is promoted to owner.
pub async fn create_singleton(pool: &AnyPool, name: &str) -> Result<Server> {
    let id = new_id();
    sqlx::query("INSERT INTO servers (id, name, admin_user_id, setup_complete) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(Uuid::nil())
        .bind(false)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    sqlx::query("INSERT INTO server_configs (server_id) VALUES (?)")
        .bind(id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get(pool, id).await
}

pub async fn set_owner(pool: &AnyPool, server_id: Uuid, owner_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE servers SET admin_user_id = ?, setup_complete = TRUE WHERE id = ?")
        .bind(owner_id)
        .bind(server_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

pub async fn update_config(pool: &AnyPool, config: &ServerConfig) -> Result<()> {
    sqlx::query(
        "UPDATE server_configs SET max_upload_size_bytes = ?, max_shared_storage_bytes = ?,
         allow_local_accounts = ?, require_invite = ?, allow_member_dms = ?, show_system_messages = ?
         WHERE server_id = ?",
    )
    .bind(config.max_upload_size_bytes)
    .bind(config.max_shared_storage_bytes)
    .bind(config.allow_local_accounts)
    .bind(config.require_invite)
    .bind(config.allow_member_dms)
    .bind(config.show_system_messages)
    .bind(config.server_id)
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    Ok(())
}

pub async fn create_category(pool: &AnyPool, server_id: Uuid, name: &str, position: i32) -> Result<Category> {
    let id = new_id();
    sqlx::query("INSERT INTO categories (id, server_id, name, position) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(server_id)
        .bind(name)
        .bind(position)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(Category { id, server_id, name: name.to_string(), position })
}

pub async fn list_categories(pool: &AnyPool, server_id: Uuid) -> Result<Vec<Category>> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE server_id = ? ORDER BY position")
        .bind(server_id)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn delete_category(pool: &AnyPool, category_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(category_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

pub async fn reorder_categories(pool: &AnyPool, ordered_ids: &[Uuid]) -> Result<()> {
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    for (position, id) in ordered_ids.iter().enumerate() {
        sqlx::query("UPDATE categories SET position = ? WHERE id = ?")
            .bind(position as i32)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(EctoError::database)?;
    }
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}
