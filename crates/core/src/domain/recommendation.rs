use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub budget: f64,
    pub risk_level: i32,
}

/// One row of the recommended portfolio. Wire names follow the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedStock {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    pub company_name: String,
    pub risk_class: i32,
    pub current_price: f64,
    #[serde(rename = "recommended_quantity")]
    pub quantity: i64,
    pub total_allocation: f64,
    pub predicted_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommended_portfolio: Vec<RecommendedStock>,
    pub total_cost: f64,
    pub remaining_budget: f64,
}
