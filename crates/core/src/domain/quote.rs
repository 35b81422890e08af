use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Latest price and risk snapshot for one ticker, as read by the allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    pub ticker: String,
    pub company_name: String,
    pub risk_class: i32,
    pub close_price: f64,
}

/// A full `stocks` row. Field names on the wire follow the frontend contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecord {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    pub company_name: String,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: i64,
    #[serde(rename = "Date")]
    pub as_of_date: NaiveDate,
    pub risk_class: Option<i32>,
    pub risk_label: Option<String>,
    pub risk_explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSuggestion {
    pub ticker: String,
    pub company_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}
