use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use stocksim_core::domain::quote::{StockRecord, StockSuggestion};
use stocksim_core::forecast::forecast_or_none;
use stocksim_core::risk::{classify_or_neutral, RiskAssessment};
use stocksim_core::storage::{prices, stocks};
use stocksim_core::valuation::forecast_error;

const SUGGESTION_LIMIT: i64 = 10;
const REPORT_HISTORY_DAYS: i64 = 30;

pub(crate) const NO_TICKER: &str = "No ticker provided.";
pub(crate) const STOCK_NOT_FOUND: &str = "Stock data not found.";

type Params = Query<HashMap<String, String>>;

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

pub async fn list_stocks(State(state): State<AppState>) -> Result<Json<Vec<StockRecord>>, ApiError> {
    let pool = state.require_pool()?;
    Ok(Json(stocks::list_stocks(pool).await?))
}

pub async fn risk_assessment(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<Value>, ApiError> {
    let ticker = param(&params, "ticker").ok_or_else(|| ApiError::bad_request(NO_TICKER))?;
    let pool = state.require_pool()?;
    let stock = stocks::get_stock(pool, ticker)
        .await?
        .ok_or_else(|| ApiError::not_found(STOCK_NOT_FOUND))?;

    Ok(Json(json!({
        "risk": stock.risk_class,
        "risk_explanation": stock.risk_explanation,
        "Close": stock.close,
    })))
}

pub async fn stock_suggestions(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<Vec<StockSuggestion>>, ApiError> {
    let pool = state.require_pool()?;
    let Some(search) = param(&params, "search") else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(stocks::suggest(pool, search, SUGGESTION_LIMIT).await?))
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    id: String,
    name: String,
    summary: String,
}

impl From<StockRecord> for ReportSummary {
    fn from(s: StockRecord) -> Self {
        Self {
            name: format!("Report - {}", s.ticker),
            summary: format!(
                "{} | Sector: {}",
                s.company_name,
                s.sector.as_deref().unwrap_or("N/A")
            ),
            id: s.ticker,
        }
    }
}

pub async fn reports(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<Value>, ApiError> {
    let pool = state.require_pool()?;
    // Unparsable risk bounds are ignored rather than rejected.
    let filter = stocks::ReportFilter {
        sector: param(&params, "sector").map(str::to_string),
        min_risk: param(&params, "minRisk").and_then(|s| s.parse().ok()),
        max_risk: param(&params, "maxRisk").and_then(|s| s.parse().ok()),
        search: param(&params, "search").map(str::to_string),
    };

    let reports: Vec<ReportSummary> = stocks::filter_stocks(pool, &filter)
        .await?
        .into_iter()
        .map(ReportSummary::from)
        .collect();
    Ok(Json(json!({ "reports": reports })))
}

#[derive(Debug, Serialize)]
pub struct ReportDetails {
    stock: String,
    dates: Vec<String>,
    prices: Vec<f64>,
    predicted_close: f64,
    forecast_error: f64,
    risk_metrics: RiskAssessment,
}

pub async fn report_details(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<ReportDetails>, ApiError> {
    let pool = state.require_pool()?;
    let history = prices::recent_history(pool, &ticker, REPORT_HISTORY_DAYS).await?;
    let Some(last_close) = history.last().map(|p| p.close) else {
        return Err(ApiError::not_found("No historical data found for this ticker."));
    };

    let timeout = state.model_timeout();
    let (forecast, risk_metrics) = tokio::join!(
        forecast_or_none(state.forecaster.as_ref(), &ticker, timeout),
        classify_or_neutral(state.risk.as_ref(), &ticker, timeout),
    );
    let predicted_close = forecast.map_or(last_close, |f| f.predicted_close);

    Ok(Json(ReportDetails {
        dates: history
            .iter()
            .map(|p| p.date.format("%Y-%m-%d").to_string())
            .collect(),
        prices: history.iter().map(|p| p.close).collect(),
        predicted_close,
        forecast_error: forecast_error(predicted_close, last_close),
        risk_metrics,
        stock: ticker,
    }))
}
