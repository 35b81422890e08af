pub mod allocator;
pub mod auth;
pub mod domain;
pub mod forecast;
pub mod ingest;
pub mod market;
pub mod model_service;
pub mod recommend;
pub mod risk;
pub mod storage;
pub mod valuation;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_MODEL_SERVICE_TIMEOUT_MS: u64 = 3_000;
    const DEFAULT_FORECAST_PERCENT_BIAS: f64 = 10.0;
    const DEFAULT_MAX_CANDIDATES: usize = 10;
    const DEFAULT_FORECAST_CONCURRENCY: usize = 4;
    const DEFAULT_STATIC_DIR: &str = "frontend/build";
    const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub model_service_url: Option<String>,
        pub model_service_timeout: Duration,
        pub forecast_percent_bias: f64,
        pub recommendation_max_candidates: usize,
        pub forecast_concurrency: usize,
        pub static_dir: String,
        pub session_ttl_days: i64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let model_service_timeout_ms = parse_env("MODEL_SERVICE_TIMEOUT_MS")?
                .unwrap_or(DEFAULT_MODEL_SERVICE_TIMEOUT_MS);
            let forecast_concurrency =
                parse_env("FORECAST_CONCURRENCY")?.unwrap_or(DEFAULT_FORECAST_CONCURRENCY);
            anyhow::ensure!(
                forecast_concurrency >= 1,
                "FORECAST_CONCURRENCY must be >= 1"
            );
            let recommendation_max_candidates = parse_env("RECOMMENDATION_MAX_CANDIDATES")?
                .unwrap_or(DEFAULT_MAX_CANDIDATES);
            anyhow::ensure!(
                recommendation_max_candidates >= 1,
                "RECOMMENDATION_MAX_CANDIDATES must be >= 1"
            );

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                model_service_url: std::env::var("MODEL_SERVICE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                model_service_timeout: Duration::from_millis(model_service_timeout_ms),
                forecast_percent_bias: parse_env("FORECAST_PERCENT_BIAS")?
                    .unwrap_or(DEFAULT_FORECAST_PERCENT_BIAS),
                recommendation_max_candidates,
                forecast_concurrency,
                static_dir: std::env::var("STATIC_DIR")
                    .unwrap_or_else(|_| DEFAULT_STATIC_DIR.to_string()),
                session_ttl_days: parse_env("SESSION_TTL_DAYS")?
                    .unwrap_or(DEFAULT_SESSION_TTL_DAYS),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_model_service_url(&self) -> anyhow::Result<&str> {
            self.model_service_url
                .as_deref()
                .context("MODEL_SERVICE_URL is required")
        }
    }

    fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match std::env::var(key) {
            Ok(s) if !s.trim().is_empty() => s
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
            _ => Ok(None),
        }
    }
}
