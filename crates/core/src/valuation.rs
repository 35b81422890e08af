//! Projected gains shown next to holdings, trades and recommendations.
//!
//! Every projection adds the same optimistic bias `K` (`FORECAST_PERCENT_BIAS`)
//! to the forecast delta before scaling.

use serde::Serialize;

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `((predicted - current + bias) / current) * 100`, rounded; 0 when there is
/// no forecast or the current price is 0.
pub fn predicted_percent(current_price: f64, predicted_close: Option<f64>, bias: f64) -> f64 {
    match predicted_close {
        Some(predicted) if current_price != 0.0 => {
            round2(((predicted - current_price + bias) / current_price) * 100.0)
        }
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionValuation {
    pub ticker: String,
    pub company_name: String,
    pub quantity: i64,
    pub average_cost: f64,
    pub current_price: f64,
    pub predicted_future_price: f64,
    pub profit_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub total_profit_loss: f64,
}

pub struct PositionInput<'a> {
    pub ticker: &'a str,
    pub company_name: &'a str,
    pub quantity: i64,
    pub average_cost: f64,
    pub current_price: f64,
    pub predicted_close: Option<f64>,
}

/// Values holdings against the forecast. Missing forecasts fall back to the
/// current price. Totals are summed unrounded and rounded once.
pub fn value_portfolio(
    positions: &[PositionInput<'_>],
    bias: f64,
) -> (Vec<PositionValuation>, PortfolioSummary) {
    let mut total_value = 0.0;
    let mut total_profit_loss = 0.0;
    let mut rows = Vec::with_capacity(positions.len());

    for p in positions {
        let predicted = p.predicted_close.unwrap_or(p.current_price);
        let qty = p.quantity as f64;
        let profit_loss = (predicted - p.average_cost + bias) * qty;

        total_value += p.current_price * qty;
        total_profit_loss += profit_loss;

        rows.push(PositionValuation {
            ticker: p.ticker.to_string(),
            company_name: p.company_name.to_string(),
            quantity: p.quantity,
            average_cost: round2(p.average_cost),
            current_price: round2(p.current_price),
            predicted_future_price: round2(p.current_price + profit_loss),
            profit_loss: round2(profit_loss),
        });
    }

    (
        rows,
        PortfolioSummary {
            total_value: round2(total_value),
            total_profit_loss: round2(total_profit_loss),
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeProjection {
    pub profit_loss: f64,
    pub percent_change: f64,
}

pub fn project_trade(
    purchase_price: f64,
    quantity: i64,
    predicted_close: f64,
    bias: f64,
) -> TradeProjection {
    let qty = quantity as f64;
    let profit_loss = (predicted_close - purchase_price + bias) * qty;
    let invested = purchase_price * qty;
    let percent_change = if invested != 0.0 {
        profit_loss / invested * 100.0
    } else {
        0.0
    };
    TradeProjection {
        profit_loss,
        percent_change,
    }
}

/// Absolute forecast deviation from the last close, in percent.
pub fn forecast_error(predicted_close: f64, last_close: f64) -> f64 {
    if last_close == 0.0 {
        return 0.0;
    }
    round2((predicted_close - last_close).abs() / last_close * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicted_percent_applies_bias() {
        // ((110 - 100 + 10) / 100) * 100
        assert_eq!(predicted_percent(100.0, Some(110.0), 10.0), 20.0);
        assert_eq!(predicted_percent(100.0, Some(110.0), 0.0), 10.0);
        assert_eq!(predicted_percent(3.0, Some(3.0), 10.0), 333.33);
    }

    #[test]
    fn predicted_percent_falls_back_to_zero() {
        assert_eq!(predicted_percent(100.0, None, 10.0), 0.0);
        assert_eq!(predicted_percent(0.0, Some(5.0), 10.0), 0.0);
    }

    #[test]
    fn portfolio_uses_current_price_without_forecast() {
        let positions = [
            PositionInput {
                ticker: "AAA",
                company_name: "AAA",
                quantity: 2,
                average_cost: 50.0,
                current_price: 60.0,
                predicted_close: None,
            },
            PositionInput {
                ticker: "BBB",
                company_name: "BBB",
                quantity: 1,
                average_cost: 20.0,
                current_price: 25.0,
                predicted_close: Some(30.0),
            },
        ];
        let (rows, summary) = value_portfolio(&positions, 10.0);

        // (60 - 50 + 10) * 2
        assert_eq!(rows[0].profit_loss, 40.0);
        assert_eq!(rows[0].predicted_future_price, 100.0);
        // (30 - 20 + 10) * 1
        assert_eq!(rows[1].profit_loss, 20.0);
        assert_eq!(summary.total_value, 145.0);
        assert_eq!(summary.total_profit_loss, 60.0);
    }

    #[test]
    fn trade_projection_handles_zero_investment() {
        let p = project_trade(0.0, 3, 5.0, 10.0);
        assert_eq!(p.profit_loss, 45.0);
        assert_eq!(p.percent_change, 0.0);

        let p = project_trade(10.0, 2, 12.0, 10.0);
        assert_eq!(p.profit_loss, 24.0);
        assert_eq!(p.percent_change, 120.0);
    }

    #[test]
    fn forecast_error_is_relative_to_last_close() {
        assert_eq!(forecast_error(105.0, 100.0), 5.0);
        assert_eq!(forecast_error(95.0, 100.0), 5.0);
        assert_eq!(forecast_error(95.0, 0.0), 0.0);
    }
}
