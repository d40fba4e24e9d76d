use ecto_domain::entities::Role;
use ecto_domain::permissions::Permission;
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

pub async fn get(pool: &AnyPool, role_id: Uuid) -> Result<Role> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = ?")
        .bind(role_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::ROLE_NOT_FOUND, "role not found"))
}

pub async fn list_for_server(pool: &AnyPool, server_id: Uuid) -> Result<Vec<Role>> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE server_id = ? ORDER BY position")
        .bind(server_id)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn create_default_role(pool: &AnyPool, server_id: Uuid) -> Result<Role> {
    let id = new_id();
    let default_perms = Permission::READ_MESSAGES | Permission::SEND_MESSAGES | Permission::ADD_REACTIONS | Permission::CONNECT_VOICE | Permission::SPEAK_VOICE | Permission::BROWSE_FILES;
    sqlx::query("INSERT INTO roles (id, server_id, name, position, permissions, is_default) VALUES (?, ?, 'everyone', 0, ?, TRUE)")
        .bind(id)
        .bind(server_id)
        .bind(default_perms.bits() as i64)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get(pool, id).await
}

pub async fn create(pool: &AnyPool, server_id: Uuid, name: &str, position: i32) -> Result<Role> {
    let id = new_id();
    sqlx::query("INSERT INTO roles (id, server_id, name, position, permissions, is_default) VALUES (?, ?, ?, ?, 0, FALSE)")
        .bind(id)
        .bind(server_id)
        .bind(name)
        .bind(position)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get(pool, id).await
}

/// Rejects deletion of a server's `is_default` (`@everyone`) role.
pub async fn delete(pool: &AnyPool, role_id: Uuid) -> Result<()> {
    let role = get(pool, role_id).await?;
    if role.is_default {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "cannot delete the default role"));
    }
    sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(role_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

pub async fn update(pool: &AnyPool, role_id: Uuid, name: Option<&str>, color: Option<i32>, permissions: Option<Permission>, position: Option<i32>) -> Result<Role> {
    if let Some(p) = position {
        if p < 0 {
            return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "position must be >= 0"));
        }
    }
    let current = get(pool, role_id).await?;
    sqlx::query("UPDATE roles SET name = ?, color = ?, permissions = ?, position = ? WHERE id = ?")
        .bind(name.unwrap_or(&current.name))
        .bind(color.or(current.color))
        .bind(permissions.map(|p| p.bits() as i64).unwrap_or(current.permissions))
        .bind(position.unwrap_or(current.position))
        .bind(role_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get(pool, role_id).await
}

pub async fn reorder(pool: &AnyPool, ordered_ids: &[Uuid]) -> Result<()> {
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    for (position, id) in ordered_ids.iter().enumerate() {
        sqlx::query("UPDATE roles SET position = ? WHERE id = ?")
            .bind(position as i32)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(EctoError::database)?;
    }
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}

pub async fn list_overrides_for_category(pool: &AnyPool, category_id: Uuid) -> Result<Vec<(Uuid, String, Uuid, i64, i64)>> {
    sqlx::query_as("SELECT id, target_type, target_id, allow, deny FROM category_permission_overrides WHERE category_id = ?")
        .bind(category_id)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn upsert_category_override(pool: &AnyPool, category_id: Uuid, target_type: &str, target_id: Uuid, allow: i64, deny: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO category_permission_overrides (id, category_id, target_type, target_id, allow, deny)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (category_id, target_type, target_id) DO UPDATE SET allow = excluded.allow, deny = excluded.deny",
    )
    .bind(new_id())
    .bind(category_id)
    .bind(target_type)
    .bind(target_id)
    .bind(allow)
    .bind(deny)
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    Ok(())
}

pub async fn delete_category_override(pool: &AnyPool, category_id: Uuid, target_type: &str, target_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM category_permission_overrides WHERE category_id = ? AND target_type = ? AND target_id = ?")
        .bind(category_id)
        .bind(target_type)
        .bind(target_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}
