use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for ledger_entries table: balance movements that are not trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub amount: i64,
    pub market_id: Option<Uuid>,
    pub option_id: Option<Uuid>,
    /// Winning shares held at resolution (payouts only).
    pub shares: Option<f64>,
    /// Fractional share value not paid out because balances are whole units.
    pub remainder: Option<f64>,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry kinds.
pub mod ledger_kind {
    pub const GRANT: &str = "grant";
    pub const PAYOUT: &str = "payout";
}
