use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;

use crate::db::{MarketStore, StoreError};
use crate::errors::EngineError;
use crate::events::OptionProbability;
use crate::models::Trade;

use super::locks::MarketLocks;
use super::plan::{plan_trade, TradeRequest};
use super::SettlementConfig;

/// Outcome of a committed trade.
#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub trade: Trade,
    pub new_balance: i64,
    pub probabilities: Vec<OptionProbability>,
}

/// Settle one trade: lock the market, load, re-quote, check, commit.
///
/// The lock serializes settlements within this process; the store's version
/// check catches commits from other processes, in which case the trade is
/// re-planned against the newer book (bounded by `max_commit_retries`).
pub async fn settle(
    store: &dyn MarketStore,
    locks: &MarketLocks,
    config: &SettlementConfig,
    req: &TradeRequest,
) -> Result<TradeReceipt, EngineError> {
    let started = Instant::now();
    let _guard = locks.acquire(req.market_id, config.lock_timeout).await?;

    let mut attempt: u32 = 0;
    loop {
        let book = store
            .load_book(req.market_id)
            .await?
            .ok_or(EngineError::MarketNotFound(req.market_id))?;
        let balance = store.balance(req.user_id).await?;
        let position = store.position(req.user_id, req.option_id).await?;

        let plan = plan_trade(
            req,
            &book,
            balance,
            position.as_ref(),
            config.slippage_tolerance,
            Utc::now(),
        )?;

        match store.commit_trade(&plan.write).await {
            Ok(new_balance) => {
                let trade = plan.write.trade;
                histogram!("settlement_latency_seconds").record(started.elapsed().as_secs_f64());
                counter!("trades_settled_total").increment(1);

                tracing::info!(
                    trade_id = %trade.id,
                    market_id = %trade.market_id,
                    option_id = %trade.option_id,
                    user_id = %trade.user_id,
                    side = %trade.side,
                    shares = trade.shares,
                    total = trade.total,
                    amount_settled = trade.amount_settled,
                    new_balance,
                    "Trade settled"
                );

                return Ok(TradeReceipt {
                    trade,
                    new_balance,
                    probabilities: OptionProbability::from_pairs(&plan.write.probabilities),
                });
            }
            Err(StoreError::VersionConflict { market_id, expected }) => {
                if attempt >= config.max_commit_retries {
                    tracing::warn!(
                        market_id = %market_id,
                        attempts = attempt + 1,
                        "Settlement gave up after repeated version conflicts"
                    );
                    return Err(EngineError::Conflict(market_id));
                }
                attempt += 1;
                counter!("settlement_retries_total").increment(1);
                tracing::debug!(
                    market_id = %market_id,
                    expected_version = expected,
                    attempt,
                    "Market moved during settlement, re-planning"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
}
