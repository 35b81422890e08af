use anyhow::Context;

// Advisory locks are scoped to the Postgres session, so the lock and unlock
// must run on the same connection.
const LOCK_NAMESPACE: i64 = 0x5354_4B53_494D; // "STKSIM"

/// Stable key per job name (FNV-1a folded into the namespace).
pub fn lock_key_for_job(job: &str) -> i64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in job.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    LOCK_NAMESPACE ^ (hash as i64)
}

pub async fn try_acquire_job_lock(
    conn: &mut sqlx::PgConnection,
    job: &str,
) -> anyhow::Result<bool> {
    let key = lock_key_for_job(job);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (job={job}, key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_job_lock(conn: &mut sqlx::PgConnection, job: &str) -> anyhow::Result<()> {
    let key = lock_key_for_job(job);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to release advisory lock (job={job}, key={key})"))?;
    Ok(())
}
