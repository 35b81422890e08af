use crate::domain::quote::PricePoint;
use anyhow::Context;
use chrono::NaiveDate;

pub async fn latest_close(pool: &sqlx::PgPool, ticker: &str) -> anyhow::Result<Option<f64>> {
    sqlx::query_scalar::<_, f64>(
        "SELECT close FROM historical_prices \
         WHERE ticker = $1 \
         ORDER BY date DESC \
         LIMIT 1",
    )
    .bind(ticker)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("select latest close for {ticker} failed"))
}

/// The most recent `limit` closes, returned oldest first.
pub async fn recent_history(
    pool: &sqlx::PgPool,
    ticker: &str,
    limit: i64,
) -> anyhow::Result<Vec<PricePoint>> {
    let rows = sqlx::query_as::<_, (NaiveDate, f64)>(
        "SELECT date, close FROM ( \
             SELECT date, close FROM historical_prices \
             WHERE ticker = $1 \
             ORDER BY date DESC \
             LIMIT $2 \
         ) recent \
         ORDER BY date ASC",
    )
    .bind(ticker)
    .bind(limit)
    .fetch_all(pool)
    .await
    .with_context(|| format!("select history for {ticker} failed"))?;

    Ok(rows
        .into_iter()
        .map(|(date, close)| PricePoint { date, close })
        .collect())
}
