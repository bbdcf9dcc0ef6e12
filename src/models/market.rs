use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for markets table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Market {
    pub id: Uuid,
    pub question: String,
    pub category: Option<String>,
    pub country: Option<String>,
    pub close_at: DateTime<Utc>,
    /// LMSR liquidity parameter `b`. Fixed for the market's lifetime.
    pub liquidity: f64,
    pub resolved: bool,
    pub winning_option_id: Option<Uuid>,
    pub volume: f64,
    /// Bumped on every committed trade or resolution.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Market {
    /// Trades are accepted only while unresolved and before the close time.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        !self.resolved && now < self.close_at
    }
}

/// Database row for market_options table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketOption {
    pub id: Uuid,
    pub market_id: Uuid,
    pub label: String,
    /// Index of this outcome in the market's share vector.
    pub ordinal: i32,
    pub shares: f64,
    pub probability: f64,
}

/// A market together with its outcomes, ordered by `ordinal`.
///
/// This is the versioned aggregate every settlement plans against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketBook {
    #[serde(flatten)]
    pub market: Market,
    pub options: Vec<MarketOption>,
}

impl MarketBook {
    pub fn new(market: Market, mut options: Vec<MarketOption>) -> Self {
        options.sort_by_key(|o| o.ordinal);
        Self { market, options }
    }

    /// Outstanding share vector in ordinal order.
    pub fn shares(&self) -> Vec<f64> {
        self.options.iter().map(|o| o.shares).collect()
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.options.iter().map(|o| o.probability).collect()
    }

    pub fn option_index(&self, option_id: Uuid) -> Option<usize> {
        self.options.iter().position(|o| o.id == option_id)
    }
}

/// Input for creating a market and its outcomes in one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMarket {
    pub question: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub close_at: DateTime<Utc>,
    pub liquidity: f64,
    pub options: Vec<String>,
}
