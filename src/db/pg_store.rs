use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ledger::ledger_kind;
use crate::models::position::DUST_SHARES;
use crate::models::{LedgerEntry, MarketBook, MarketOption, Position, Side, Trade};
use crate::settlement::write_set::{
    PayoutWriteSet, PositionWrite, ResolutionWriteSet, TradeWriteSet,
};

use super::{account_repo, market_repo, position_repo, trade_repo};
use super::{MarketStore, PayoutOutcome, StoreError};

/// Postgres-backed store. Each commit runs in a single transaction; any early
/// return drops the transaction, which rolls it back.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Work out why a version-guarded update matched no row.
    async fn classify_miss(&self, market_id: Uuid, expected: i64) -> StoreError {
        match market_repo::get_market(&self.pool, market_id).await {
            Ok(None) => StoreError::MarketNotFound(market_id),
            Ok(Some(m)) if m.resolved => StoreError::AlreadyResolved(market_id),
            Ok(Some(_)) => StoreError::VersionConflict { market_id, expected },
            Err(e) => StoreError::Backend(e),
        }
    }
}

#[async_trait]
impl MarketStore for PgStore {
    async fn create_market(&self, book: &MarketBook) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        market_repo::insert_market(&mut *tx, &book.market).await?;
        for option in &book.options {
            market_repo::insert_option(&mut *tx, option).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_book(&self, market_id: Uuid) -> Result<Option<MarketBook>, StoreError> {
        let Some(market) = market_repo::get_market(&self.pool, market_id).await? else {
            return Ok(None);
        };
        let options = market_repo::get_options(&self.pool, market_id).await?;
        Ok(Some(MarketBook::new(market, options)))
    }

    async fn list_markets(&self) -> Result<Vec<MarketBook>, StoreError> {
        let markets = market_repo::list_markets(&self.pool).await?;
        let ids: Vec<Uuid> = markets.iter().map(|m| m.id).collect();

        let mut by_market: HashMap<Uuid, Vec<MarketOption>> = HashMap::new();
        for option in market_repo::get_options_for_markets(&self.pool, &ids).await? {
            by_market.entry(option.market_id).or_default().push(option);
        }

        Ok(markets
            .into_iter()
            .map(|m| {
                let options = by_market.remove(&m.id).unwrap_or_default();
                MarketBook::new(m, options)
            })
            .collect())
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, StoreError> {
        Ok(account_repo::get_balance(&self.pool, user_id).await?)
    }

    async fn position(&self, user_id: Uuid, option_id: Uuid) -> Result<Option<Position>, StoreError> {
        Ok(position_repo::get_position(&self.pool, user_id, option_id).await?)
    }

    async fn positions_for_user(&self, user_id: Uuid) -> Result<Vec<Position>, StoreError> {
        Ok(position_repo::get_positions_for_user(&self.pool, user_id).await?)
    }

    async fn positions_for_option(&self, option_id: Uuid) -> Result<Vec<Position>, StoreError> {
        Ok(position_repo::get_positions_for_option(&self.pool, option_id).await?)
    }

    async fn trades_for_market(&self, market_id: Uuid, limit: i64) -> Result<Vec<Trade>, StoreError> {
        Ok(trade_repo::get_trades_for_market(&self.pool, market_id, limit).await?)
    }

    async fn trades_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Trade>, StoreError> {
        Ok(trade_repo::get_trades_for_user(&self.pool, user_id, limit).await?)
    }

    async fn ledger_for_user(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(account_repo::get_ledger_for_user(&self.pool, user_id).await?)
    }

    async fn grant(&self, user_id: Uuid, amount: i64, memo: Option<String>) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let new_balance = account_repo::credit(&mut *tx, user_id, amount).await?;
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            user_id,
            kind: ledger_kind::GRANT.into(),
            amount,
            market_id: None,
            option_id: None,
            shares: None,
            remainder: None,
            memo,
            created_at: Utc::now(),
        };
        account_repo::insert_ledger_entry(&mut *tx, &entry).await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn commit_trade(&self, write: &TradeWriteSet) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The version CAS goes first: it row-locks the market, so competing
        // commits from other processes queue here and then miss the version.
        let advanced = market_repo::advance_version(
            &mut *tx,
            write.market_id,
            write.expected_version,
            write.volume_delta,
        )
        .await?;
        if !advanced {
            drop(tx);
            return Err(self.classify_miss(write.market_id, write.expected_version).await);
        }

        let new_balance = if write.balance_delta >= 0 {
            account_repo::credit(&mut *tx, write.user_id, write.balance_delta).await?
        } else {
            let required = -write.balance_delta;
            match account_repo::debit(&mut *tx, write.user_id, required).await? {
                Some(balance) => balance,
                None => {
                    let available = account_repo::get_balance(&mut *tx, write.user_id).await?;
                    return Err(StoreError::InsufficientFunds { required, available });
                }
            }
        };

        if write.trade.side == Side::Sell {
            let held = position_repo::get_position(&mut *tx, write.user_id, write.option_id)
                .await?
                .map(|p| p.shares)
                .unwrap_or(0.0);
            if held + DUST_SHARES < write.trade.shares {
                return Err(StoreError::InsufficientShares {
                    requested: write.trade.shares,
                    held,
                });
            }
        }

        market_repo::set_option_shares(&mut *tx, write.option_id, write.option_shares).await?;
        for (option_id, probability) in &write.probabilities {
            market_repo::set_option_probability(&mut *tx, *option_id, *probability).await?;
        }

        match &write.position {
            PositionWrite::Upsert { shares, average_price } => {
                let position = Position {
                    user_id: write.user_id,
                    market_id: write.market_id,
                    option_id: write.option_id,
                    shares: *shares,
                    average_price: *average_price,
                    updated_at: write.trade.created_at,
                };
                position_repo::upsert_position(&mut *tx, &position).await?;
            }
            PositionWrite::Delete => {
                position_repo::delete_position(&mut *tx, write.user_id, write.option_id).await?;
            }
        }

        trade_repo::insert_trade(&mut *tx, &write.trade).await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn commit_resolution(&self, write: &ResolutionWriteSet) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let resolved = market_repo::mark_resolved(
            &mut *tx,
            write.market_id,
            write.expected_version,
            write.winning_option_id,
            write.resolved_at,
        )
        .await?;
        if !resolved {
            drop(tx);
            return Err(self.classify_miss(write.market_id, write.expected_version).await);
        }

        for (option_id, probability) in &write.probabilities {
            market_repo::set_option_probability(&mut *tx, *option_id, *probability).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn commit_payout(&self, write: &PayoutWriteSet) -> Result<PayoutOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let entry = LedgerEntry {
            id: write.entry_id,
            user_id: write.user_id,
            kind: ledger_kind::PAYOUT.into(),
            amount: write.amount,
            market_id: Some(write.market_id),
            option_id: Some(write.option_id),
            shares: Some(write.shares),
            remainder: Some(write.remainder),
            memo: None,
            created_at: write.created_at,
        };
        if !account_repo::insert_ledger_entry(&mut *tx, &entry).await? {
            return Ok(PayoutOutcome::AlreadyPaid);
        }

        let new_balance = account_repo::credit(&mut *tx, write.user_id, write.amount).await?;

        tx.commit().await?;
        Ok(PayoutOutcome::Paid { new_balance })
    }
}
