use crate::ingest::types::IngestBatch;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceStats {
    pub stocks_upserted: u64,
    pub stocks_removed: u64,
    pub history_rows: u64,
}

/// Swaps in a freshly ingested universe in one transaction. Risk columns of
/// tickers that stay in the universe are preserved.
pub async fn replace_market_data(
    pool: &sqlx::PgPool,
    batch: &IngestBatch,
) -> anyhow::Result<ReplaceStats> {
    anyhow::ensure!(!batch.stocks.is_empty(), "stocks must be non-empty");

    let chunk_size: usize = std::env::var("INGEST_BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_BATCH_SIZE);
    anyhow::ensure!(chunk_size >= 1, "INGEST_BATCH_SIZE must be >= 1");

    let mut stats = ReplaceStats::default();
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let tickers: Vec<String> = batch.stocks.iter().map(|s| s.ticker.clone()).collect();
    stats.stocks_removed = sqlx::query("DELETE FROM stocks WHERE NOT (ticker = ANY($1))")
        .bind(&tickers)
        .execute(&mut *tx)
        .await
        .context("delete stale stocks failed")?
        .rows_affected();

    for chunk in batch.stocks.chunks(chunk_size) {
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO stocks (ticker, company_name, sector, market_cap, close, volume, as_of_date) ",
        );
        qb.push_values(chunk, |mut b, s| {
            b.push_bind(s.ticker.trim())
                .push_bind(s.company_name.trim())
                .push_bind(s.sector.as_deref())
                .push_bind(s.market_cap)
                .push_bind(s.close)
                .push_bind(s.volume)
                .push_bind(s.as_of_date);
        });
        qb.push(
            " ON CONFLICT (ticker) DO UPDATE \
               SET company_name = EXCLUDED.company_name, sector = EXCLUDED.sector, \
                   market_cap = EXCLUDED.market_cap, close = EXCLUDED.close, \
                   volume = EXCLUDED.volume, as_of_date = EXCLUDED.as_of_date",
        );
        stats.stocks_upserted += qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch upsert stocks failed")?
            .rows_affected();
    }

    sqlx::query("DELETE FROM historical_prices")
        .execute(&mut *tx)
        .await
        .context("clear historical_prices failed")?;

    let mut batch_idx: usize = 0;
    for chunk in batch.history.chunks(chunk_size) {
        batch_idx += 1;
        let t0 = std::time::Instant::now();
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO historical_prices (ticker, date, open, high, low, close, close_norm, volume) ",
        );
        qb.push_values(chunk, |mut b, r| {
            b.push_bind(r.ticker.trim())
                .push_bind(r.date)
                .push_bind(r.open)
                .push_bind(r.high)
                .push_bind(r.low)
                .push_bind(r.close)
                .push_bind(r.close_norm)
                .push_bind(r.volume);
        });

        stats.history_rows += qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch insert historical_prices failed")?
            .rows_affected();

        tracing::debug!(
            batch_idx,
            batch_size = chunk.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "historical_prices batch insert"
        );
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(stats)
}

pub async fn record_ingest_run(
    pool: &sqlx::PgPool,
    job: &str,
    status: &str,
    error: Option<&str>,
    details: Option<Value>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let generated_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO ingest_runs (id, generated_at, job, status, error, details) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .persistent(false)
    .bind(id)
    .bind(generated_at)
    .bind(job)
    .bind(status)
    .bind(error)
    .bind(details)
    .execute(pool)
    .await
    .context("insert ingest_runs failed")?;

    Ok(id)
}
