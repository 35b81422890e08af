use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post, put};
use axum::Router;
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

mod account;
mod market;
mod recommendations;
mod trading;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/stocks", get(market::list_stocks))
        .route("/api/riskAssessment", get(market::risk_assessment))
        .route("/api/stockSuggestions", get(market::stock_suggestions))
        .route("/api/reports", get(market::reports))
        .route("/api/report_details/:ticker", get(market::report_details))
        .route("/api/recommendations", post(recommendations::recommend))
        .route("/api/register", post(account::register))
        .route("/api/login", post(account::login))
        .route("/api/logout", post(account::logout))
        .route("/api/profile", get(account::profile))
        .route("/api/account", get(account::account))
        .route("/api/deposit", post(account::deposit))
        .route("/api/subscription", put(account::subscription))
        .route("/api/notifications", post(account::notifications))
        .route(
            "/api/constraints",
            get(account::get_constraints).put(account::put_constraints),
        )
        .route("/api/purchase", post(trading::purchase))
        .route("/api/portfolio", get(trading::portfolio))
        .route("/api/transactions", get(trading::transactions))
        .with_state(state)
}

/// API routes plus the built frontend; unknown paths get `index.html`.
pub fn app(state: AppState, static_dir: &str) -> Router {
    let index = Path::new(static_dir).join("index.html");
    api_router(state).fallback_service(ServeDir::new(static_dir).fallback(ServeFile::new(index)))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Turns axum's body rejections into the JSON error shape.
fn json_body<T>(body: Result<axum::Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|axum::Json(v)| v)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e.body_text())))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;
    use stocksim_core::domain::quote::StockQuote;
    use stocksim_core::forecast::{Forecast, ForecastClient, UnavailableForecaster};
    use stocksim_core::market::InMemoryQuoteStore;
    use stocksim_core::recommend::RecommendOptions;
    use stocksim_core::risk::UnavailableRiskClassifier;
    use tower::ServiceExt;

    pub struct FixedForecaster(pub f64);

    #[async_trait::async_trait]
    impl ForecastClient for FixedForecaster {
        async fn forecast(&self, _ticker: &str) -> anyhow::Result<Forecast> {
            Ok(Forecast {
                predicted_close: self.0,
            })
        }
    }

    pub fn quote(ticker: &str, risk_class: i32, close_price: f64) -> StockQuote {
        StockQuote {
            ticker: ticker.to_string(),
            company_name: format!("{ticker} Inc"),
            risk_class,
            close_price,
        }
    }

    pub fn state_with(quotes: Vec<StockQuote>, forecaster: Arc<dyn ForecastClient>) -> AppState {
        AppState {
            pool: None,
            quotes: Some(Arc::new(InMemoryQuoteStore::new(quotes))),
            forecaster,
            risk: Arc::new(UnavailableRiskClassifier),
            recommend: RecommendOptions::default(),
            session_ttl_days: 7,
        }
    }

    pub fn offline_state() -> AppState {
        AppState {
            pool: None,
            quotes: None,
            forecaster: Arc::new(UnavailableForecaster),
            risk: Arc::new(UnavailableRiskClassifier),
            recommend: RecommendOptions::default(),
            session_ttl_days: 7,
        }
    }

    pub async fn send(state: AppState, req: Request<Body>) -> (StatusCode, Value) {
        let res = api_router(state).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn healthz_works_without_database() {
        let res = tower::ServiceExt::oneshot(
            super::api_router(offline_state()),
            get("/healthz"),
        )
        .await
        .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn database_routes_degrade_to_503() {
        for uri in [
            "/api/stocks",
            "/api/stockSuggestions?search=a",
            "/api/reports",
            "/api/report_details/aapl",
            "/api/riskAssessment?ticker=aapl",
        ] {
            let (status, body) = send(offline_state(), get(uri)).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
            assert_eq!(body["error"], "Database unavailable");
        }
    }

    #[tokio::test]
    async fn authenticated_routes_require_session_cookie() {
        for uri in ["/api/profile", "/api/account", "/api/portfolio", "/api/transactions"] {
            let (status, body) = send(offline_state(), get(uri)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "Not logged in");
        }
    }
}
