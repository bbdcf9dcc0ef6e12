pub mod account_repo;
pub mod market_repo;
pub mod memory;
pub mod pg_store;
pub mod position_repo;
pub mod trade_repo;

pub use memory::MemoryStore;
pub use pg_store::PgStore;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{LedgerEntry, MarketBook, Position, Trade};
use crate::settlement::write_set::{PayoutWriteSet, ResolutionWriteSet, TradeWriteSet};

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("market {0} not found")]
    MarketNotFound(Uuid),

    #[error("market {market_id} moved past version {expected}")]
    VersionConflict { market_id: Uuid, expected: i64 },

    #[error("market {0} is already resolved")]
    AlreadyResolved(Uuid),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: f64, held: f64 },

    #[error("balance of user {0} would overflow")]
    BalanceOverflow(Uuid),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutOutcome {
    Paid { new_balance: i64 },
    /// A payout entry for this (market, user) already exists.
    AlreadyPaid,
}

/// Persistence collaborator for the exchange.
///
/// Reads may observe any committed state. Every `commit_*` call is
/// all-or-nothing: on `Err` no record has changed.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Insert a market and all of its options atomically.
    async fn create_market(&self, book: &MarketBook) -> Result<(), StoreError>;

    async fn load_book(&self, market_id: Uuid) -> Result<Option<MarketBook>, StoreError>;

    async fn list_markets(&self) -> Result<Vec<MarketBook>, StoreError>;

    /// Current balance; users without an account have zero.
    async fn balance(&self, user_id: Uuid) -> Result<i64, StoreError>;

    async fn position(&self, user_id: Uuid, option_id: Uuid) -> Result<Option<Position>, StoreError>;

    async fn positions_for_user(&self, user_id: Uuid) -> Result<Vec<Position>, StoreError>;

    async fn positions_for_option(&self, option_id: Uuid) -> Result<Vec<Position>, StoreError>;

    /// Most recent trades first.
    async fn trades_for_market(&self, market_id: Uuid, limit: i64) -> Result<Vec<Trade>, StoreError>;

    /// Most recent trades first.
    async fn trades_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Trade>, StoreError>;

    async fn ledger_for_user(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Credit `amount` units with a `grant` ledger entry. Returns the new balance.
    async fn grant(&self, user_id: Uuid, amount: i64, memo: Option<String>) -> Result<i64, StoreError>;

    /// Apply a settled trade. Returns the user's new balance.
    async fn commit_trade(&self, write: &TradeWriteSet) -> Result<i64, StoreError>;

    async fn commit_resolution(&self, write: &ResolutionWriteSet) -> Result<(), StoreError>;

    /// Credit one winner and record its payout entry, unless already paid.
    async fn commit_payout(&self, write: &PayoutWriteSet) -> Result<PayoutOutcome, StoreError>;
}
