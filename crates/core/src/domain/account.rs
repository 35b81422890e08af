use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub sms: bool,
}

/// A user without credentials. The password hash never leaves storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub balance: f64,
    pub subscription_status: bool,
    pub notification_preferences: NotificationPreferences,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub user_id: Uuid,
    pub ticker: String,
    pub quantity: i64,
    pub purchase_price: f64,
    pub total_price: f64,
    #[serde(rename = "transaction_type")]
    pub transaction_type: String,
    #[serde(rename = "risk_assessment")]
    pub risk_assessment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub company_name: String,
    pub quantity: i64,
    pub average_cost: f64,
}
