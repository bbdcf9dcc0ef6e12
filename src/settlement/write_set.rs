//! Complete record mutations produced by planning. A store applies each
//! write-set as one atomic unit or not at all.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Trade;

/// Final state of the trader's position after a settlement.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionWrite {
    Upsert { shares: f64, average_price: f64 },
    Delete,
}

#[derive(Debug, Clone)]
pub struct TradeWriteSet {
    pub market_id: Uuid,
    /// Market version observed when the plan was made (compare-and-swap).
    pub expected_version: i64,
    pub user_id: Uuid,
    /// Signed change to the user's balance; the store refuses to let it go negative.
    pub balance_delta: i64,
    pub option_id: Uuid,
    /// New outstanding shares for the traded option.
    pub option_shares: f64,
    /// New probability for every option of the market.
    pub probabilities: Vec<(Uuid, f64)>,
    pub position: PositionWrite,
    pub volume_delta: f64,
    pub trade: Trade,
}

#[derive(Debug, Clone)]
pub struct ResolutionWriteSet {
    pub market_id: Uuid,
    pub expected_version: i64,
    pub winning_option_id: Uuid,
    pub probabilities: Vec<(Uuid, f64)>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PayoutWriteSet {
    pub entry_id: Uuid,
    pub market_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
    pub shares: f64,
    pub amount: i64,
    pub remainder: f64,
    pub created_at: DateTime<Utc>,
}
