use ecto_domain::entities::{ActivityItem, CachedProfile, LocalUser};
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

/// Registers a local-auth account. Caller is responsible for hashing the
/// password (argon2, external collaborator) before calling this.
pub async fn create_local_user(
    pool: &AnyPool,
    username: &str,
    password_hash: &str,
    display_name: Option<&str>,
) -> Result<LocalUser> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO local_users (id, username, password_hash, display_name) VALUES (?, ?, ?, ?)",
    )
    .bind(id)
    .bind(username)
    .bind(password_hash)
    .bind(display_name)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            EctoError::conflict(ecto_domain::error::codes::USERNAME_TAKEN, "username already taken")
        } else {
            EctoError::database(e)
        }
    })?;
    get_local_user(pool, id).await
}

pub async fn get_local_user(pool: &AnyPool, id: Uuid) -> Result<LocalUser> {
    sqlx::query_as::<_, LocalUser>("SELECT * FROM local_users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::USER_NOT_FOUND, "user not found"))
}

pub async fn find_local_user_by_username(pool: &AnyPool, username: &str) -> Result<Option<LocalUser>> {
    sqlx::query_as::<_, LocalUser>("SELECT * FROM local_users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn update_local_profile(
    pool: &AnyPool,
    id: Uuid,
    display_name: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<LocalUser> {
    sqlx::query("UPDATE local_users SET display_name = ?, avatar_url = ? WHERE id = ?")
        .bind(display_name)
        .bind(avatar_url)
        .bind(id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get_local_user(pool, id).await
}

/// Upserts the cached copy of an externally-resolved profile, refreshing
/// `fetched_at` so the central-auth client's TTL check sees it as current.
pub async fn upsert_cached_profile(
    pool: &AnyPool,
    external_user_id: Uuid,
    username: &str,
    discriminator: &str,
    display_name: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<CachedProfile> {
    sqlx::query(
        "INSERT INTO cached_profiles (external_user_id, username, discriminator, display_name, avatar_url, fetched_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (external_user_id) DO UPDATE SET
           username = excluded.username,
           discriminator = excluded.discriminator,
           display_name = excluded.display_name,
           avatar_url = excluded.avatar_url,
           fetched_at = excluded.fetched_at",
    )
    .bind(external_user_id)
    .bind(username)
    .bind(discriminator)
    .bind(display_name)
    .bind(avatar_url)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await
    .map_err(EctoError::database)?;
    get_cached_profile(pool, external_user_id)
        .await?
        .ok_or_else(|| EctoError::Internal("cached profile missing immediately after upsert".into()))
}

pub async fn get_cached_profile(pool: &AnyPool, external_user_id: Uuid) -> Result<Option<CachedProfile>> {
    sqlx::query_as::<_, CachedProfile>("SELECT * FROM cached_profiles WHERE external_user_id = ?")
        .bind(external_user_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn record_activity(
    pool: &AnyPool,
    user_id: Uuid,
    server_id: Uuid,
    kind: &str,
    details: serde_json::Value,
) -> Result<ActivityItem> {
    let id = new_id();
    let details_json = serde_json::to_string(&details).expect("json value always serializes");
    sqlx::query("INSERT INTO activity_items (id, user_id, server_id, kind, details) VALUES (?, ?, ?, ?, ?)")
        .bind(id)
        .bind(user_id)
        .bind(server_id)
        .bind(kind)
        .bind(details_json)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(ActivityItem { id, user_id, server_id, kind: kind.to_string(), details, created_at: chrono::Utc::now() })
}

pub async fn list_activity(pool: &AnyPool, user_id: Uuid, limit: i64) -> Result<Vec<ActivityItem>> {
    sqlx::query_as::<_, ActivityItem>(
        "SELECT * FROM activity_items WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(EctoError::database)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false)
}
