use anyhow::Context;
use chrono::{Duration, Utc};
use uuid::Uuid;

pub async fn create_session(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    ttl_days: i64,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::days(ttl_days);

    sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await
        .context("insert session failed")?;

    Ok(id)
}

/// Owner of a live session; expired sessions resolve to `None`.
pub async fn resolve_session(pool: &sqlx::PgPool, session_id: Uuid) -> anyhow::Result<Option<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT user_id FROM sessions WHERE id = $1 AND expires_at > now()",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .context("select session failed")
}

pub async fn delete_session(pool: &sqlx::PgPool, session_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = $1 OR expires_at <= now()")
        .bind(session_id)
        .execute(pool)
        .await
        .context("delete session failed")?;
    Ok(())
}
