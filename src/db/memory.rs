use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::ledger::ledger_kind;
use crate::models::position::DUST_SHARES;
use crate::models::{LedgerEntry, MarketBook, Position, Side, Trade};
use crate::settlement::write_set::{
    PayoutWriteSet, PositionWrite, ResolutionWriteSet, TradeWriteSet,
};

use super::{MarketStore, PayoutOutcome, StoreError};

/// In-process store used when no `DATABASE_URL` is configured and in tests.
///
/// A single mutex guards all records, so each commit validates its guards
/// and applies its writes without any interleaving.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    markets: HashMap<Uuid, MarketBook>,
    balances: HashMap<Uuid, i64>,
    /// Keyed by (user_id, option_id).
    positions: HashMap<(Uuid, Uuid), Position>,
    trades: Vec<Trade>,
    ledger: Vec<LedgerEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T: Clone>(items: impl DoubleEndedIterator<Item = T>, limit: i64) -> Vec<T> {
    items.rev().take(limit.max(0) as usize).collect()
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn create_market(&self, book: &MarketBook) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.markets.insert(book.market.id, book.clone());
        Ok(())
    }

    async fn load_book(&self, market_id: Uuid) -> Result<Option<MarketBook>, StoreError> {
        Ok(self.inner.lock().markets.get(&market_id).cloned())
    }

    async fn list_markets(&self) -> Result<Vec<MarketBook>, StoreError> {
        let inner = self.inner.lock();
        let mut books: Vec<MarketBook> = inner.markets.values().cloned().collect();
        books.sort_by(|a, b| b.market.created_at.cmp(&a.market.created_at));
        Ok(books)
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, StoreError> {
        Ok(self.inner.lock().balances.get(&user_id).copied().unwrap_or(0))
    }

    async fn position(&self, user_id: Uuid, option_id: Uuid) -> Result<Option<Position>, StoreError> {
        Ok(self.inner.lock().positions.get(&(user_id, option_id)).cloned())
    }

    async fn positions_for_user(&self, user_id: Uuid) -> Result<Vec<Position>, StoreError> {
        let inner = self.inner.lock();
        let mut positions: Vec<Position> = inner
            .positions
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        positions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(positions)
    }

    async fn positions_for_option(&self, option_id: Uuid) -> Result<Vec<Position>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .positions
            .values()
            .filter(|p| p.option_id == option_id)
            .cloned()
            .collect())
    }

    async fn trades_for_market(&self, market_id: Uuid, limit: i64) -> Result<Vec<Trade>, StoreError> {
        let inner = self.inner.lock();
        Ok(newest_first(
            inner.trades.iter().filter(|t| t.market_id == market_id).cloned(),
            limit,
        ))
    }

    async fn trades_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Trade>, StoreError> {
        let inner = self.inner.lock();
        Ok(newest_first(
            inner.trades.iter().filter(|t| t.user_id == user_id).cloned(),
            limit,
        ))
    }

    async fn ledger_for_user(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        let inner = self.inner.lock();
        Ok(newest_first(
            inner.ledger.iter().filter(|e| e.user_id == user_id).cloned(),
            i64::MAX,
        ))
    }

    async fn grant(&self, user_id: Uuid, amount: i64, memo: Option<String>) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        let balance = inner.balances.entry(user_id).or_insert(0);
        let new_balance = balance
            .checked_add(amount)
            .ok_or(StoreError::BalanceOverflow(user_id))?;
        *balance = new_balance;

        inner.ledger.push(LedgerEntry {
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
        });

        Ok(new_balance)
    }

    async fn commit_trade(&self, write: &TradeWriteSet) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        let state = &mut *inner;

        // Validate every guard before touching anything.
        let book = state
            .markets
            .get_mut(&write.market_id)
            .ok_or(StoreError::MarketNotFound(write.market_id))?;
        if book.market.version != write.expected_version {
            return Err(StoreError::VersionConflict {
                market_id: write.market_id,
                expected: write.expected_version,
            });
        }

        let available = state.balances.get(&write.user_id).copied().unwrap_or(0);
        let new_balance = available
            .checked_add(write.balance_delta)
            .ok_or(StoreError::BalanceOverflow(write.user_id))?;
        if new_balance < 0 {
            return Err(StoreError::InsufficientFunds {
                required: -write.balance_delta,
                available,
            });
        }

        let key = (write.user_id, write.option_id);
        if write.trade.side == Side::Sell {
            let held = state.positions.get(&key).map(|p| p.shares).unwrap_or(0.0);
            if held + DUST_SHARES < write.trade.shares {
                return Err(StoreError::InsufficientShares {
                    requested: write.trade.shares,
                    held,
                });
            }
        }

        // Apply.
        state.balances.insert(write.user_id, new_balance);

        for option in book.options.iter_mut() {
            if option.id == write.option_id {
                option.shares = write.option_shares;
            }
            if let Some((_, p)) = write.probabilities.iter().find(|(id, _)| *id == option.id) {
                option.probability = *p;
            }
        }
        book.market.volume += write.volume_delta;
        book.market.version += 1;

        match &write.position {
            PositionWrite::Upsert { shares, average_price } => {
                state.positions.insert(
                    key,
                    Position {
                        user_id: write.user_id,
                        market_id: write.market_id,
                        option_id: write.option_id,
                        shares: *shares,
                        average_price: *average_price,
                        updated_at: write.trade.created_at,
                    },
                );
            }
            PositionWrite::Delete => {
                state.positions.remove(&key);
            }
        }

        state.trades.push(write.trade.clone());

        Ok(new_balance)
    }

    async fn commit_resolution(&self, write: &ResolutionWriteSet) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let book = inner
            .markets
            .get_mut(&write.market_id)
            .ok_or(StoreError::MarketNotFound(write.market_id))?;

        if book.market.resolved {
            return Err(StoreError::AlreadyResolved(write.market_id));
        }
        if book.market.version != write.expected_version {
            return Err(StoreError::VersionConflict {
                market_id: write.market_id,
                expected: write.expected_version,
            });
        }

        for option in book.options.iter_mut() {
            if let Some((_, p)) = write.probabilities.iter().find(|(id, _)| *id == option.id) {
                option.probability = *p;
            }
        }
        book.market.resolved = true;
        book.market.winning_option_id = Some(write.winning_option_id);
        book.market.resolved_at = Some(write.resolved_at);
        book.market.version += 1;

        Ok(())
    }

    async fn commit_payout(&self, write: &PayoutWriteSet) -> Result<PayoutOutcome, StoreError> {
        let mut inner = self.inner.lock();

        let already_paid = inner.ledger.iter().any(|e| {
            e.kind == ledger_kind::PAYOUT
                && e.market_id == Some(write.market_id)
                && e.user_id == write.user_id
        });
        if already_paid {
            return Ok(PayoutOutcome::AlreadyPaid);
        }

        let balance = inner.balances.entry(write.user_id).or_insert(0);
        let new_balance = balance
            .checked_add(write.amount)
            .ok_or(StoreError::BalanceOverflow(write.user_id))?;
        *balance = new_balance;

        inner.ledger.push(LedgerEntry {
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
        });

        Ok(PayoutOutcome::Paid { new_balance })
    }
}
