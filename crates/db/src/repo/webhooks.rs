use ecto_domain::entities::Webhook;
use ecto_domain::{ids::new_id, EctoError, Result};
use rand::Rng;
use sqlx::AnyPool;
use uuid::Uuid;

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..32).map(|_| format!("{:x}", rng.gen_range(0..16))).collect()
}

pub async fn get(pool: &AnyPool, webhook_id: Uuid) -> Result<Webhook> {
    sqlx::query_as::<_, Webhook>("SELECT * FROM webhooks WHERE id = ?")
        .bind(webhook_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::VALIDATION, "webhook not found"))
}

pub async fn list_for_channel(pool: &AnyPool, channel_id: Uuid) -> Result<Vec<Webhook>> {
    sqlx::query_as::<_, Webhook>("SELECT * FROM webhooks WHERE channel_id = ? ORDER BY created_at")
        .bind(channel_id)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}

pub async fn create(pool: &AnyPool, server_id: Uuid, channel_id: Uuid, name: &str, created_by: Uuid) -> Result<Webhook> {
    let id = new_id();
    let token = generate_token();
    sqlx::query("INSERT INTO webhooks (id, channel_id, server_id, name, token, created_by) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(id)
        .bind(channel_id)
        .bind(server_id)
        .bind(name)
        .bind(&token)
        .bind(created_by)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get(pool, id).await
}

pub async fn regenerate_token(pool: &AnyPool, webhook_id: Uuid) -> Result<Webhook> {
    let token = generate_token();
    sqlx::query("UPDATE webhooks SET token = ? WHERE id = ?")
        .bind(&token)
        .bind(webhook_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    get(pool, webhook_id).await
}

pub async fn delete(pool: &AnyPool, webhook_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM webhooks WHERE id = ?")
        .bind(webhook_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}
