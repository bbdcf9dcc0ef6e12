use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Positions at or below this many shares are treated as closed and removed.
pub const DUST_SHARES: f64 = 1e-9;

/// Database row for positions table. One row per (user, option).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub user_id: Uuid,
    pub market_id: Uuid,
    pub option_id: Uuid,
    pub shares: f64,
    /// Volume-weighted average price paid per share.
    pub average_price: f64,
    pub updated_at: DateTime<Utc>,
}
