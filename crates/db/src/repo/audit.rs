use ecto_domain::entities::AuditLogEntry;
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

pub async fn record(
    tx: &mut sqlx::Transaction<'_, sqlx::Any>,
    server_id: Uuid,
    actor_id: Uuid,
    action: &str,
    target_type: Option<&str>,
    target_id: Option<Uuid>,
    details: serde_json::Value,
) -> Result<()> {
    let details_json = serde_json::to_string(&details).expect("json value always serializes");
    sqlx::query(
        "INSERT INTO audit_log_entries (id, server_id, actor_id, action, target_type, target_id, details)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(new_id())
    .bind(server_id)
    .bind(actor_id)
    .bind(action)
    .bind(target_type)
    .bind(target_id)
    .bind(details_json)
    .execute(&mut **tx)
    .await
    .map_err(EctoError::database)?;
    Ok(())
}

pub async fn list(pool: &AnyPool, server_id: Uuid, before: Option<Uuid>, limit: i64) -> Result<Vec<AuditLogEntry>> {
    if let Some(before_id) = before {
        sqlx::query_as::<_, AuditLogEntry>(
            "SELECT * FROM audit_log_entries WHERE server_id = ?
               AND created_at < (SELECT created_at FROM audit_log_entries WHERE id = ?)
             ORDER BY created_at DESC LIMIT ?",
        )
        .bind(server_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
    } else {
        sqlx::query_as::<_, AuditLogEntry>("SELECT * FROM audit_log_entries WHERE server_id = ? ORDER BY created_at DESC LIMIT ?")
            .bind(server_id)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(EctoError::database)
    }
}
