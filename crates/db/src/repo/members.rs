use ecto_domain::entities::{IdentityType, Member};
use ecto_domain::{ids::new_id, EctoError, Result};
use sqlx::AnyPool;
use uuid::Uuid;

pub async fn get(pool: &AnyPool, server_id: Uuid, user_id: Uuid) -> Result<Member> {
    sqlx::query_as::<_, Member>("SELECT * FROM members WHERE server_id = ? AND user_id = ?")
        .bind(server_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(EctoError::database)?
        .ok_or_else(|| EctoError::not_found(ecto_domain::error::codes::NOT_A_MEMBER, "not a member of this server"))
}

pub async fn count(pool: &AnyPool, server_id: Uuid) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE server_id = ?")
        .bind(server_id)
        .fetch_one(pool)
        .await
        .map_err(EctoError::database)
}

/// Inserts the member row and assigns the `@everyone` role. Caller decides
/// whether to promote to owner first (first member ever).
pub async fn join(pool: &AnyPool, server_id: Uuid, user_id: Uuid, identity_type: IdentityType, default_role_id: Uuid) -> Result<Member> {
    let id = new_id();
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    sqlx::query("INSERT INTO members (id, server_id, user_id, identity_type) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(server_id)
        .bind(user_id)
        .bind(identity_type)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    sqlx::query("INSERT INTO member_roles (member_id, role_id) VALUES (?, ?)")
        .bind(id)
        .bind(default_role_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    tx.commit().await.map_err(EctoError::database)?;
    get(pool, server_id, user_id).await
}

/// Deletes the member row and everything keyed on `(user_id, this server)`
/// that has no foreign key of its own to lean on: `member_roles` cascades
/// via its FK to `members(id)`, but `read_states`/`dm_read_states` are
/// keyed on the raw `user_id` (not `member_id`), so they're cleaned up here
/// explicitly, scoped to this server's channels and DM conversations.
pub async fn leave(pool: &AnyPool, server_id: Uuid, user_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    leave_tx(&mut tx, server_id, user_id).await?;
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}

/// Same cleanup as [`leave`], but inside a transaction the caller already
/// holds — used by kick/ban so the read/dm cleanup, member delete, and
/// audit log insert commit or abort together.
pub async fn leave_tx(tx: &mut sqlx::Transaction<'_, sqlx::Any>, server_id: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query(
        "DELETE FROM read_states WHERE user_id = ? AND channel_id IN (SELECT id FROM channels WHERE server_id = ?)",
    )
    .bind(user_id)
    .bind(server_id)
    .execute(&mut **tx)
    .await
    .map_err(EctoError::database)?;
    sqlx::query(
        "DELETE FROM dm_read_states WHERE user_id = ? AND conversation_id IN
            (SELECT id FROM dm_conversations WHERE server_id = ? AND (user_a = ? OR user_b = ?))",
    )
    .bind(user_id)
    .bind(server_id)
    .bind(user_id)
    .bind(user_id)
    .execute(&mut **tx)
    .await
    .map_err(EctoError::database)?;
    sqlx::query("DELETE FROM members WHERE server_id = ? AND user_id = ?")
        .bind(server_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

pub async fn update_nickname(pool: &AnyPool, member_id: Uuid, nickname: Option<&str>) -> Result<()> {
    sqlx::query("UPDATE members SET nickname = ? WHERE id = ?")
        .bind(nickname)
        .bind(member_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

pub async fn bump_token_version(pool: &AnyPool, member_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE members SET token_version = token_version + 1 WHERE id = ?")
        .bind(member_id)
        .execute(pool)
        .await
        .map_err(EctoError::database)?;
    Ok(())
}

/// Replaces the member's non-default role assignments, always keeping the
/// default role present.
pub async fn set_roles(pool: &AnyPool, member_id: Uuid, default_role_id: Uuid, role_ids: &[Uuid]) -> Result<()> {
    let mut tx = pool.begin().await.map_err(EctoError::database)?;
    sqlx::query("DELETE FROM member_roles WHERE member_id = ?")
        .bind(member_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    sqlx::query("INSERT INTO member_roles (member_id, role_id) VALUES (?, ?)")
        .bind(member_id)
        .bind(default_role_id)
        .execute(&mut *tx)
        .await
        .map_err(EctoError::database)?;
    for role_id in role_ids {
        if *role_id == default_role_id {
            continue;
        }
        sqlx::query("INSERT INTO member_roles (member_id, role_id) VALUES (?, ?)")
            .bind(member_id)
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(EctoError::database)?;
    }
    tx.commit().await.map_err(EctoError::database)?;
    Ok(())
}

pub async fn list_for_server(pool: &AnyPool, server_id: Uuid, cap: i64) -> Result<Vec<Member>> {
    sqlx::query_as::<_, Member>("SELECT * FROM members WHERE server_id = ? ORDER BY joined_at LIMIT ?")
        .bind(server_id)
        .bind(cap)
        .fetch_all(pool)
        .await
        .map_err(EctoError::database)
}

/// Every distinct user in `server_id` holding at least one of `role_ids` —
/// used to expand a message's role mentions into the set of users to notify.
pub async fn list_user_ids_with_roles(pool: &AnyPool, server_id: Uuid, role_ids: &[Uuid]) -> Result<Vec<Uuid>> {
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = role_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!(
        "SELECT DISTINCT m.user_id FROM members m
           JOIN member_roles mr ON mr.member_id = m.id
         WHERE m.server_id = ? AND mr.role_id IN ({placeholders})"
    );
    let mut query = sqlx::query_scalar(&sql).bind(server_id);
    for role_id in role_ids {
        query = query.bind(role_id);
    }
    query.fetch_all(pool).await.map_err(EctoError::database)
}

pub async fn role_position_rank(pool: &AnyPool, member_id: Uuid) -> Result<i32> {
    sqlx::query_scalar(
        "SELECT COALESCE(MAX(r.position), 0) FROM roles r JOIN member_roles mr ON mr.role_id = r.id WHERE mr.member_id = ?",
    )
    .bind(member_id)
    .fetch_one(pool)
    .await
    .map_err(EctoError::database)
}
