use crate::domain::account::{NotificationPreferences, User};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

type UserRow = (Uuid, String, String, f64, bool, bool, bool, DateTime<Utc>);

const USER_COLUMNS: &str =
    "id, username, email, balance, subscription_status, notify_email, notify_sms, created_at";

fn into_user(row: UserRow) -> User {
    let (id, username, email, balance, subscription_status, email_pref, sms_pref, created_at) = row;
    User {
        id,
        username,
        email,
        balance,
        subscription_status,
        notification_preferences: NotificationPreferences {
            email: email_pref,
            sms: sms_pref,
        },
        created_at,
    }
}

/// Inserts a user; `None` when the email is already registered.
pub async fn create_user(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (id, username, email, password_hash) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (email) DO NOTHING \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_optional(pool)
    .await
    .context("insert user failed")?;
    Ok(row.map(into_user))
}

/// User plus stored password hash, for login.
pub async fn find_credentials(
    pool: &sqlx::PgPool,
    email: &str,
) -> anyhow::Result<Option<(User, String)>> {
    let row = sqlx::query_as::<_, (Uuid, String, String, f64, bool, bool, bool, DateTime<Utc>, String)>(
        &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"),
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("select user by email failed")?;

    Ok(row.map(|(id, username, email, balance, sub, ne, ns, created_at, hash)| {
        (
            into_user((id, username, email, balance, sub, ne, ns, created_at)),
            hash,
        )
    }))
}

pub async fn get_user(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("select user failed")?;
    Ok(row.map(into_user))
}

/// Atomic `balance += amount`; returns the new balance.
pub async fn deposit(pool: &sqlx::PgPool, user_id: Uuid, amount: f64) -> anyhow::Result<Option<f64>> {
    anyhow::ensure!(amount.is_finite() && amount > 0.0, "deposit must be positive");
    sqlx::query_scalar::<_, f64>(
        "UPDATE users SET balance = balance + $2 WHERE id = $1 RETURNING balance",
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(pool)
    .await
    .context("deposit failed")
}

pub async fn set_subscription(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    active: bool,
) -> anyhow::Result<bool> {
    let res = sqlx::query("UPDATE users SET subscription_status = $2 WHERE id = $1")
        .bind(user_id)
        .bind(active)
        .execute(pool)
        .await
        .context("update subscription failed")?;
    Ok(res.rows_affected() == 1)
}

pub async fn set_notifications(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    prefs: NotificationPreferences,
) -> anyhow::Result<bool> {
    let res = sqlx::query("UPDATE users SET notify_email = $2, notify_sms = $3 WHERE id = $1")
        .bind(user_id)
        .bind(prefs.email)
        .bind(prefs.sms)
        .execute(pool)
        .await
        .context("update notification preferences failed")?;
    Ok(res.rows_affected() == 1)
}

pub async fn get_constraints(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<Option<Value>> {
    sqlx::query_scalar::<_, Value>("SELECT constraints FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("select constraints failed")
}

pub async fn set_constraints(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    constraints: &Value,
) -> anyhow::Result<bool> {
    let res = sqlx::query("UPDATE users SET constraints = $2 WHERE id = $1")
        .bind(user_id)
        .bind(constraints)
        .execute(pool)
        .await
        .context("update constraints failed")?;
    Ok(res.rows_affected() == 1)
}
