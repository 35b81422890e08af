use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stocksim_core::config::Settings;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod ingest;
mod risk;

#[derive(Debug, Parser)]
#[command(name = "stocksim_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load bulk `*.us.txt` price files into `stocks` and `historical_prices`.
    Ingest {
        /// Dataset root holding `Stocks/` and `ETFs/` (or the files themselves).
        #[arg(long)]
        dir: PathBuf,

        /// Keep this many tickers, ranked by average volume.
        #[arg(long, default_value_t = stocksim_core::ingest::flatfile::DEFAULT_TOP_N)]
        top: usize,

        /// Do everything except writing to the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Classify every stock with the model service and store its risk class.
    RiskPrecompute {
        /// Classify but do not store.
        #[arg(long)]
        dry_run: bool,
    },
}

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

    let args = Args::parse();

    let result = match args.command {
        Command::Ingest { dir, top, dry_run } => ingest::run(&settings, &dir, top, dry_run).await,
        Command::RiskPrecompute { dry_run } => risk::run(&settings, dry_run).await,
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

pub(crate) async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    stocksim_core::storage::migrate(&pool).await?;
    Ok(pool)
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
