use crate::domain::quote::{StockQuote, StockRecord, StockSuggestion};
use crate::market::QuoteStore;
use crate::risk::RiskAssessment;
use crate::storage::contains_pattern;
use anyhow::Context;
use chrono::NaiveDate;

type StockRow = (
    String,
    String,
    Option<String>,
    Option<f64>,
    f64,
    i64,
    NaiveDate,
    Option<i32>,
    Option<String>,
    Option<String>,
);

const STOCK_COLUMNS: &str = "ticker, company_name, sector, market_cap, close, volume, as_of_date, \
     risk_class, risk_label, risk_explanation";

fn into_record(row: StockRow) -> StockRecord {
    let (
        ticker,
        company_name,
        sector,
        market_cap,
        close,
        volume,
        as_of_date,
        risk_class,
        risk_label,
        risk_explanation,
    ) = row;
    StockRecord {
        ticker,
        company_name,
        sector,
        market_cap,
        close,
        volume,
        as_of_date,
        risk_class,
        risk_label,
        risk_explanation,
    }
}

/// `QuoteStore` over the `stocks` table. Rows without a computed risk class
/// are invisible to the allocator.
#[derive(Debug, Clone)]
pub struct PgQuoteStore {
    pool: sqlx::PgPool,
}

impl PgQuoteStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuoteStore for PgQuoteStore {
    async fn find_by_risk_ceiling(&self, max_risk: i32) -> anyhow::Result<Vec<StockQuote>> {
        let rows = sqlx::query_as::<_, (String, String, i32, f64)>(
            "SELECT ticker, company_name, risk_class, close \
             FROM stocks \
             WHERE risk_class IS NOT NULL AND risk_class <= $1 \
             ORDER BY ticker ASC",
        )
        .bind(max_risk)
        .fetch_all(&self.pool)
        .await
        .context("select stocks by risk ceiling failed")?;

        Ok(rows
            .into_iter()
            .map(|(ticker, company_name, risk_class, close_price)| StockQuote {
                ticker,
                company_name,
                risk_class,
                close_price,
            })
            .collect())
    }

    async fn get_quote(&self, ticker: &str) -> anyhow::Result<Option<StockQuote>> {
        let row = sqlx::query_as::<_, (String, String, i32, f64)>(
            "SELECT ticker, company_name, risk_class, close \
             FROM stocks \
             WHERE ticker = $1 AND risk_class IS NOT NULL",
        )
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await
        .context("select stock quote failed")?;

        Ok(row.map(|(ticker, company_name, risk_class, close_price)| StockQuote {
            ticker,
            company_name,
            risk_class,
            close_price,
        }))
    }
}

pub async fn list_stocks(pool: &sqlx::PgPool) -> anyhow::Result<Vec<StockRecord>> {
    let rows = sqlx::query_as::<_, StockRow>(&format!(
        "SELECT {STOCK_COLUMNS} FROM stocks ORDER BY volume DESC, ticker ASC"
    ))
    .fetch_all(pool)
    .await
    .context("select stocks failed")?;
    Ok(rows.into_iter().map(into_record).collect())
}

pub async fn get_stock(pool: &sqlx::PgPool, ticker: &str) -> anyhow::Result<Option<StockRecord>> {
    let row = sqlx::query_as::<_, StockRow>(&format!(
        "SELECT {STOCK_COLUMNS} FROM stocks WHERE ticker = $1"
    ))
    .bind(ticker)
    .fetch_optional(pool)
    .await
    .context("select stock failed")?;
    Ok(row.map(into_record))
}

pub async fn list_tickers(pool: &sqlx::PgPool) -> anyhow::Result<Vec<String>> {
    sqlx::query_scalar::<_, String>("SELECT ticker FROM stocks ORDER BY ticker ASC")
        .fetch_all(pool)
        .await
        .context("select tickers failed")
}

pub async fn suggest(
    pool: &sqlx::PgPool,
    search: &str,
    limit: i64,
) -> anyhow::Result<Vec<StockSuggestion>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT ticker, company_name FROM stocks \
         WHERE ticker ILIKE $1 OR company_name ILIKE $1 \
         ORDER BY ticker ASC \
         LIMIT $2",
    )
    .bind(contains_pattern(search))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("select stock suggestions failed")?;

    Ok(rows
        .into_iter()
        .map(|(ticker, company_name)| StockSuggestion {
            ticker,
            company_name,
        })
        .collect())
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub sector: Option<String>,
    pub min_risk: Option<i32>,
    pub max_risk: Option<i32>,
    pub search: Option<String>,
}

pub async fn filter_stocks(
    pool: &sqlx::PgPool,
    filter: &ReportFilter,
) -> anyhow::Result<Vec<StockRecord>> {
    let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
        "SELECT {STOCK_COLUMNS} FROM stocks WHERE TRUE"
    ));
    if let Some(sector) = &filter.sector {
        qb.push(" AND sector = ").push_bind(sector.clone());
    }
    if let Some(min_risk) = filter.min_risk {
        qb.push(" AND risk_class >= ").push_bind(min_risk);
    }
    if let Some(max_risk) = filter.max_risk {
        qb.push(" AND risk_class <= ").push_bind(max_risk);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(search);
        qb.push(" AND (ticker ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR company_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb.push(" ORDER BY ticker ASC");

    let rows = qb
        .build_query_as::<StockRow>()
        .fetch_all(pool)
        .await
        .context("filter stocks failed")?;
    Ok(rows.into_iter().map(into_record).collect())
}

pub async fn update_risk(
    pool: &sqlx::PgPool,
    ticker: &str,
    assessment: &RiskAssessment,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        "UPDATE stocks \
         SET risk_class = $2, risk_label = $3, risk_explanation = $4, risk_updated_at = now() \
         WHERE ticker = $1",
    )
    .bind(ticker)
    .bind(assessment.risk_class)
    .bind(&assessment.overall_risk)
    .bind(&assessment.detailed_explanation)
    .execute(pool)
    .await
    .with_context(|| format!("update risk for {ticker} failed"))?;
    Ok(res.rows_affected() == 1)
}
