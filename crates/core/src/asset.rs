//! Price-quote payload types.
//!
//! The engine treats these as opaque; only the view reads their fields.
//! Numeric fields stay as text, exactly as the quote endpoint sends them.

use serde::{Deserialize, Serialize};

/// One quoted asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub rank: String,
    pub symbol: String,
    pub name: String,
    pub supply: String,
    /// Absent for assets without a supply cap.
    #[serde(default)]
    pub max_supply: Option<String>,
    pub market_cap_usd: String,
    pub volume_usd24_hr: String,
    pub price_usd: String,
    pub change_percent24_hr: String,
    #[serde(default)]
    pub vwap24_hr: Option<String>,
    #[serde(default)]
    pub explorer: Option<String>,
}

/// Body of a successful quote response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsResponse {
    pub data: Vec<Asset>,
    /// Server time in epoch milliseconds, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}
