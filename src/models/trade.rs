use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Side;

/// Database row for trades table. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: Uuid,
    pub user_id: Uuid,
    pub market_id: Uuid,
    pub option_id: Uuid,
    #[sqlx(try_from = "String")]
    pub side: Side,
    pub shares: f64,
    /// Realized price per share.
    pub unit_price: f64,
    /// Exact LMSR cost (buy) or payout (sell).
    pub total: f64,
    /// Whole currency units actually moved on the user's balance.
    pub amount_settled: i64,
    pub created_at: DateTime<Utc>,
}
