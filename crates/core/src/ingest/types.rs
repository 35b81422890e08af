use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One parsed line of a per-ticker price file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPriceRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPriceRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub close_norm: f64,
    pub volume: i64,
}

/// Latest row per ticker, written to `stocks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshotRow {
    pub ticker: String,
    pub company_name: String,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub close: f64,
    pub volume: i64,
    pub as_of_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestBatch {
    pub stocks: Vec<StockSnapshotRow>,
    pub history: Vec<HistoricalPriceRow>,
    pub files_read: usize,
    pub rows_skipped: usize,
}
