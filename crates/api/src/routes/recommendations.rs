use super::json_body;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::Value;
use stocksim_core::domain::recommendation::{RecommendationRequest, RecommendationResponse};
use stocksim_core::recommend;

const INVALID_INPUT: &str = "Invalid budget or risk_level.";

/// Accepts numbers or numeric strings, as browsers post form values either way.
fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn parse_request(body: &Value) -> Result<RecommendationRequest, ApiError> {
    let budget = number(body.get("budget")).ok_or_else(|| ApiError::bad_request(INVALID_INPUT))?;
    let risk_level = number(body.get("risk_level"))
        .filter(|r| r.is_finite())
        .map(|r| r.trunc())
        .ok_or_else(|| ApiError::bad_request(INVALID_INPUT))?;

    if risk_level < 1.0 || risk_level > f64::from(i32::MAX) {
        return Err(ApiError::bad_request("risk_level must be a positive integer."));
    }

    Ok(RecommendationRequest {
        budget,
        risk_level: risk_level as i32,
    })
}

pub async fn recommend(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let req = parse_request(&json_body(body)?)?;
    let quotes = state.require_quotes()?;

    let res = recommend::recommend(quotes, state.forecaster.as_ref(), req, &state.recommend).await?;

    tracing::info!(
        budget = req.budget,
        risk_level = req.risk_level,
        picks = res.recommended_portfolio.len(),
        total_cost = res.total_cost,
        "recommendation served"
    );
    Ok(Json(res))
}
