use sqlx::PgPool;
use std::sync::Arc;
use stocksim_core::config::Settings;
use stocksim_core::forecast::{ForecastClient, UnavailableForecaster};
use stocksim_core::market::QuoteStore;
use stocksim_core::model_service::ModelServiceClient;
use stocksim_core::recommend::RecommendOptions;
use stocksim_core::risk::{RiskClassifier, UnavailableRiskClassifier};
use stocksim_core::storage::stocks::PgQuoteStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod routes;
mod session;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool = connect_db(&settings).await;
    let (forecaster, risk) = model_clients(&settings);

    let state = AppState {
        quotes: pool
            .clone()
            .map(|p| Arc::new(PgQuoteStore::new(p)) as Arc<dyn QuoteStore>),
        pool,
        forecaster,
        risk,
        recommend: RecommendOptions::from_settings(&settings),
        session_ttl_days: settings.session_ttl_days,
    };

    let app = routes::app(state, &settings.static_dir)
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, static_dir = %settings.static_dir, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Database-backed routes answer 503 when this returns `None`.
async fn connect_db(settings: &Settings) -> Option<PgPool> {
    match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match stocksim_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    }
}

fn model_clients(settings: &Settings) -> (Arc<dyn ForecastClient>, Arc<dyn RiskClassifier>) {
    if settings.model_service_url.is_none() {
        tracing::warn!("MODEL_SERVICE_URL missing; forecasts and risk lookups use fallbacks");
        return (Arc::new(UnavailableForecaster), Arc::new(UnavailableRiskClassifier));
    }
    match ModelServiceClient::from_settings(settings) {
        Ok(client) => {
            let client = Arc::new(client);
            let forecaster: Arc<dyn ForecastClient> = client.clone();
            let risk: Arc<dyn RiskClassifier> = client;
            (forecaster, risk)
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "model service client init failed; using fallbacks");
            (Arc::new(UnavailableForecaster), Arc::new(UnavailableRiskClassifier))
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
