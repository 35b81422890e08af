use crate::error::ApiError;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use stocksim_core::forecast::ForecastClient;
use stocksim_core::market::QuoteStore;
use stocksim_core::recommend::RecommendOptions;
use stocksim_core::risk::RiskClassifier;

#[derive(Clone)]
pub struct AppState {
    pub pool: Option<PgPool>,
    pub quotes: Option<Arc<dyn QuoteStore>>,
    pub forecaster: Arc<dyn ForecastClient>,
    pub risk: Arc<dyn RiskClassifier>,
    pub recommend: RecommendOptions,
    pub session_ttl_days: i64,
}

impl AppState {
    pub fn require_pool(&self) -> Result<&PgPool, ApiError> {
        self.pool.as_ref().ok_or(ApiError::Unavailable)
    }

    pub fn require_quotes(&self) -> Result<&dyn QuoteStore, ApiError> {
        self.quotes.as_deref().ok_or(ApiError::Unavailable)
    }

    pub fn percent_bias(&self) -> f64 {
        self.recommend.percent_bias
    }

    pub fn model_timeout(&self) -> Duration {
        self.recommend.forecast_timeout
    }
}
