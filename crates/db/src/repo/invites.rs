use ecto_domain::entities::Invite;
use ecto_domain::{EctoError, Result};
use rand::Rng;
use sqlx::AnyPool;
use uuid::Uuid;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..8).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
}

pub async fn get(pool: &AnyPool, code: &str) -> Result<Invite> {
    sqlx::query_as::<_, Invite>("SELECT * FROM invites WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::INVITE_INVALID, "invite not found"))
}

/// Generates a unique 8-char base62 code, retrying on the rare collision.
pub async fn create(pool: &AnyPool, server_id: Uuid, created_by: Uuid, max_uses: i32, expires_at: Option<chrono::DateTime<chrono::Utc>>) -> Result<Invite> {
    for _ in 0..5 {
        let code = generate_code();
        let inserted = sqlx::query(
            "INSERT INTO invites (code, server_id, created_by, max_uses, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&code)
        .bind(server_id)
        .bind(created_by)
        .bind(max_uses)
        .bind(expires_at)
        .execute(pool)
        .await;

        if inserted.is_ok() {
            return get(pool, &code).await;
        }
    }
    Err(EctoError::Internal("failed to allocate a unique invite code".into()))
}

pub async fn increment_use(pool: &AnyPool, code: &str) -> Result<()> {
    sqlx::query("UPDATE invites SET use_count = use_count + 1 WHERE code = ?")
        .bind(code)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

pub async fn revoke(pool: &AnyPool, code: &str) -> Result<()> {
    sqlx::query("UPDATE invites SET revoked = TRUE WHERE code = ?")
        .bind(code)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

pub async fn list(pool: &AnyPool, server_id: Uuid) -> Result<Vec<Invite>> {
    sqlx::query_as::<_, Invite>("SELECT * FROM invites WHERE server_id = ? ORDER BY created_at DESC")
        .bind(server_id)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}
