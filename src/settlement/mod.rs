pub mod locks;
pub mod pipeline;
pub mod plan;
pub mod write_set;

pub use locks::MarketLocks;
pub use plan::{plan_trade, TradePlan, TradeRequest};

use std::time::Duration;

use crate::config::{
    DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_MAX_COMMIT_RETRIES, DEFAULT_SLIPPAGE_TOLERANCE,
};

/// Knobs for the settlement pipeline.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Allowed relative deviation between client and server totals (0.01 = 1%).
    pub slippage_tolerance: f64,
    /// Bound on waiting for a market's lock before failing with `Busy`.
    pub lock_timeout: Duration,
    /// Re-plans after a version conflict before giving up with `Conflict`.
    pub max_commit_retries: u32,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            slippage_tolerance: DEFAULT_SLIPPAGE_TOLERANCE,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
        }
    }
}
