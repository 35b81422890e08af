use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use stocksim_core::storage::sessions;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_id";

pub fn session_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn set_session_cookie(session_id: Uuid, ttl_days: i64) -> String {
    format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl_days * 24 * 3600
    )
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Authenticated caller, resolved from the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session_id = session_cookie(&parts.headers).ok_or_else(ApiError::not_logged_in)?;
        let pool = state.require_pool()?;
        let user_id = sessions::resolve_session(pool, session_id)
            .await?
            .ok_or_else(ApiError::not_logged_in)?;
        Ok(Self {
            user_id,
            session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_session_among_other_cookies() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; session_id={id}; lang=en")).unwrap(),
        );
        assert_eq!(session_cookie(&headers), Some(id));
    }

    #[test]
    fn ignores_missing_or_garbage_session() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_cookie(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("session_id=not-a-uuid"));
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn cookie_attributes() {
        let id = Uuid::nil();
        let c = set_session_cookie(id, 7);
        assert!(c.starts_with("session_id=00000000-0000-0000-0000-000000000000;"));
        assert!(c.contains("HttpOnly"));
        assert!(c.ends_with("Max-Age=604800"));
        assert!(clear_session_cookie().ends_with("Max-Age=0"));
    }
}
