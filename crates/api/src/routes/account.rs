use super::json_body;
use crate::error::ApiError;
use crate::session::{clear_session_cookie, session_cookie, set_session_cookie, CurrentUser};
use crate::state::AppState;
use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use stocksim_core::auth;
use stocksim_core::domain::account::{NotificationPreferences, User};
use stocksim_core::storage::{sessions, trades, users};
use stocksim_core::valuation::round2;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositBody {
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionBody {
    action: Option<String>,
}

fn required(field: Option<String>) -> Option<String> {
    field.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

async fn load_user(pool: &PgPool, user_id: Uuid) -> Result<User, ApiError> {
    users::get_user(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Drops a session the client may still carry before issuing a new one.
async fn start_session(
    state: &AppState,
    headers: &HeaderMap,
    user_id: Uuid,
) -> Result<String, ApiError> {
    let pool = state.require_pool()?;
    if let Some(previous) = session_cookie(headers) {
        sessions::delete_session(pool, previous).await?;
    }
    let session_id = sessions::create_session(pool, user_id, state.session_ttl_days).await?;
    Ok(set_session_cookie(session_id, state.session_ttl_days))
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = json_body(body)?;
    let (Some(username), Some(email), Some(password)) = (
        required(body.username),
        required(body.email).map(|e| e.to_lowercase()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("All fields are required."));
    };
    let pool = state.require_pool()?;

    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .context("password hashing task failed")?;
    let user = users::create_user(pool, &username, &email, &password_hash)
        .await?
        .ok_or_else(|| ApiError::Conflict("User already exists.".to_string()))?;

    let cookie = start_session(&state, &headers, user.id).await?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({
            "message": "User registered successfully.",
            "user": { "username": user.username, "email": user.email },
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = json_body(body)?;
    let (Some(email), Some(password)) = (
        required(body.email).map(|e| e.to_lowercase()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Email and password are required."));
    };
    let pool = state.require_pool()?;

    let invalid = || ApiError::Unauthorized("Invalid credentials.".to_string());
    let (user, stored_hash) = users::find_credentials(pool, &email)
        .await?
        .ok_or_else(invalid)?;
    let valid = tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored_hash))
        .await
        .context("password verification task failed")??;
    if !valid {
        return Err(invalid());
    }

    let cookie = start_session(&state, &headers, user.id).await?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({
            "message": "Login successful.",
            "user": { "username": user.username, "email": user.email },
        })),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(session_id) = session_cookie(&headers) {
        sessions::delete_session(state.require_pool()?, session_id).await?;
    }
    Ok((
        AppendHeaders([(SET_COOKIE, clear_session_cookie())]),
        Json(json!({ "message": "Logged out successfully." })),
    ))
}

pub async fn profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let user = load_user(state.require_pool()?, current.user_id).await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn account(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let pool = state.require_pool()?;
    let user = load_user(pool, current.user_id).await?;
    let profit: f64 = trades::list_transactions(pool, current.user_id)
        .await?
        .iter()
        .map(|t| t.total_price - t.purchase_price)
        .sum();

    Ok(Json(json!({
        "user": {
            "username": user.username,
            "email": user.email,
            "balance": user.balance,
        },
        "profit": round2(profit),
        "subscriptionStatus": user.subscription_status,
        "notificationPreferences": user.notification_preferences,
    })))
}

pub async fn deposit(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Result<Json<DepositBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let amount = json_body(body)?
        .amount
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or_else(|| ApiError::bad_request("Invalid deposit amount."))?;
    let pool = state.require_pool()?;

    let new_balance = users::deposit(pool, current.user_id, amount)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    tracing::info!(user_id = %current.user_id, amount, "deposit");

    Ok(Json(json!({
        "message": format!("Deposited ${amount:.2} successfully."),
        "newBalance": round2(new_balance),
    })))
}

pub async fn subscription(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Result<Json<SubscriptionBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let active = match json_body(body)?.action.as_deref() {
        Some("activate") => true,
        Some("deactivate") => false,
        _ => return Err(ApiError::bad_request("Invalid action.")),
    };
    let pool = state.require_pool()?;

    if !users::set_subscription(pool, current.user_id, active).await? {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(Json(json!({
        "message": if active { "Subscription activated." } else { "Subscription deactivated." },
        "subscriptionStatus": active,
    })))
}

pub async fn notifications(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Result<Json<NotificationPreferences>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let prefs = json_body(body)?;
    let pool = state.require_pool()?;

    if !users::set_notifications(pool, current.user_id, prefs).await? {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(Json(json!({
        "message": "Notification preferences updated.",
        "preferences": prefs,
    })))
}

pub async fn get_constraints(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let constraints = users::get_constraints(state.require_pool()?, current.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(json!({ "constraints": constraints })))
}

pub async fn put_constraints(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let constraints = json_body(body)?;
    if !constraints.is_object() {
        return Err(ApiError::bad_request("Constraints must be a JSON object."));
    }
    let pool = state.require_pool()?;

    if !users::set_constraints(pool, current.user_id, &constraints).await? {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(Json(json!({
        "message": "Constraints updated.",
        "constraints": constraints,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::*;
    use serde_json::json;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required(Some("  bob ".to_string())), Some("bob".to_string()));
        assert_eq!(required(Some("   ".to_string())), None);
        assert_eq!(required(None), None);
    }

    #[tokio::test]
    async fn register_validates_before_touching_database() {
        let (status, body) = send(
            offline_state(),
            post_json("/api/register", json!({"username": "bob", "email": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "All fields are required.");
    }

    #[tokio::test]
    async fn login_without_database_is_503() {
        let (status, _) = send(
            offline_state(),
            post_json("/api/login", json!({"email": "a@b.c", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn logout_without_session_clears_cookie() {
        let res = tower::ServiceExt::oneshot(
            crate::routes::api_router(offline_state()),
            post_json("/api/logout", json!({})),
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let req = axum::http::Request::post("/api/register")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let (status, body) = send(offline_state(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }
}
