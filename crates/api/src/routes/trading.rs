use super::json_body;
use crate::error::ApiError;
use crate::session::CurrentUser;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use stocksim_core::forecast::forecast_or_none;
use stocksim_core::storage::trades::{self, PurchaseOrder, PurchaseOutcome};
use stocksim_core::storage::{prices, stocks};
use stocksim_core::valuation::{project_trade, round2, value_portfolio, PositionInput};

#[derive(Debug, Deserialize)]
pub struct PurchaseBody {
    ticker: Option<String>,
    quantity: Option<i64>,
    price: Option<f64>,
    #[serde(default)]
    confirm: bool,
}

/// Predicted closes per ticker, `None` where the forecaster gave nothing.
async fn forecasts_for(state: &AppState, tickers: Vec<String>) -> HashMap<String, Option<f64>> {
    let timeout = state.model_timeout();
    let forecaster = state.forecaster.as_ref();
    stream::iter(tickers)
        .map(move |ticker| async move {
            let predicted = forecast_or_none(forecaster, &ticker, timeout)
                .await
                .map(|f| f.predicted_close);
            (ticker, predicted)
        })
        .buffered(state.recommend.forecast_concurrency.max(1))
        .collect()
        .await
}

pub async fn purchase(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Result<Json<PurchaseBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    let (Some(ticker), Some(quantity), Some(price)) = (
        body.ticker.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        body.quantity.filter(|q| *q > 0),
        body.price.filter(|p| p.is_finite() && *p > 0.0),
    ) else {
        return Err(ApiError::bad_request(
            "Missing purchase information (ticker, quantity, or price).",
        ));
    };
    let pool = state.require_pool()?;

    let stock = stocks::get_stock(pool, &ticker)
        .await?
        .ok_or_else(|| ApiError::not_found(super::market::STOCK_NOT_FOUND))?;

    if !body.confirm {
        return Ok(Json(json!({
            "message": "Risk assessment required before purchase.",
            "ticker": ticker,
            "current_price": stock.close,
            "risk": stock.risk_class,
            "risk_explanation": stock.risk_explanation,
        })));
    }

    let order = PurchaseOrder {
        ticker,
        company_name: stock.company_name,
        quantity,
        price,
        risk_assessment: stock.risk_explanation,
    };
    match trades::purchase(pool, current.user_id, &order).await? {
        PurchaseOutcome::Completed { new_balance, trade } => {
            tracing::info!(
                user_id = %current.user_id,
                ticker = %trade.ticker,
                quantity = trade.quantity,
                total_price = trade.total_price,
                "purchase completed"
            );
            Ok(Json(json!({
                "message": "Purchase simulated successfully.",
                "new_balance": round2(new_balance),
                "transaction": trade,
            })))
        }
        PurchaseOutcome::InsufficientFunds => Err(ApiError::bad_request("Insufficient funds.")),
        PurchaseOutcome::UserNotFound => Err(ApiError::not_found("User not found")),
    }
}

pub async fn portfolio(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let pool = state.require_pool()?;
    let positions = trades::list_positions(pool, current.user_id).await?;

    let mut current_prices = Vec::with_capacity(positions.len());
    for p in &positions {
        current_prices.push(prices::latest_close(pool, &p.ticker).await?.unwrap_or(0.0));
    }
    let forecasts = forecasts_for(&state, positions.iter().map(|p| p.ticker.clone()).collect()).await;

    let inputs: Vec<PositionInput<'_>> = positions
        .iter()
        .zip(&current_prices)
        .map(|(p, &current_price)| PositionInput {
            ticker: &p.ticker,
            company_name: &p.company_name,
            quantity: p.quantity,
            average_cost: p.average_cost,
            current_price,
            predicted_close: forecasts.get(&p.ticker).copied().flatten(),
        })
        .collect();
    let (rows, summary) = value_portfolio(&inputs, state.percent_bias());

    Ok(Json(json!({ "portfolio": rows, "summary": summary })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    id: String,
    symbol: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    quantity: i64,
    total_price: f64,
    profit_loss: f64,
    percent_change: f64,
    date: String,
}

pub async fn transactions(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let pool = state.require_pool()?;
    let history = trades::list_transactions(pool, current.user_id).await?;

    let tickers: BTreeSet<String> = history.iter().map(|t| t.ticker.clone()).collect();
    let mut listed = HashMap::with_capacity(tickers.len());
    for ticker in &tickers {
        if let Some(stock) = stocks::get_stock(pool, ticker).await? {
            listed.insert(ticker.clone(), (stock.company_name, stock.close));
        }
    }
    let forecasts = forecasts_for(&state, tickers.into_iter().collect()).await;

    let views: Vec<TransactionView> = history
        .into_iter()
        .map(|t| {
            let (name, current_price) = listed
                .get(&t.ticker)
                .map(|(name, close)| (name.clone(), *close))
                .unwrap_or_else(|| (t.ticker.clone(), t.purchase_price));
            let predicted = forecasts
                .get(&t.ticker)
                .copied()
                .flatten()
                .unwrap_or(current_price);
            let projection = project_trade(t.purchase_price, t.quantity, predicted, state.percent_bias());

            TransactionView {
                id: t.id.to_string(),
                name,
                kind: t.transaction_type,
                quantity: t.quantity,
                total_price: t.total_price,
                profit_loss: round2(projection.profit_loss),
                percent_change: round2(projection.percent_change),
                date: t.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                symbol: t.ticker,
            }
        })
        .collect();

    Ok(Json(json!({ "transactions": views })))
}
