//! Pure planning step of a settlement: re-quote against the loaded book,
//! apply the acceptance checks, and produce the write-set to commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::position::DUST_SHARES;
use crate::models::{MarketBook, Position, Side, Trade};
use crate::pricing::{quote, Quote};

use super::write_set::{PositionWrite, TradeWriteSet};

/// Inbound trade submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub user_id: Uuid,
    pub market_id: Uuid,
    pub option_id: Uuid,
    pub side: Side,
    pub shares: f64,
    /// Total cost (buy) or payout (sell) the client saw when it quoted.
    pub client_price: f64,
}

#[derive(Debug, Clone)]
pub struct TradePlan {
    pub quote: Quote,
    pub write: TradeWriteSet,
}

/// Whole units moved on the balance: buys round up, sells round down, so
/// integer settlement never pays out more than the LMSR total.
pub fn settled_amount(side: Side, total: f64) -> i64 {
    match side {
        Side::Buy => total.ceil() as i64,
        Side::Sell => total.floor() as i64,
    }
}

/// `|server - client| <= tolerance * client`.
pub fn within_tolerance(server_total: f64, client_price: f64, tolerance: f64) -> bool {
    (server_total - client_price).abs() <= tolerance * client_price
}

/// Validate `req` against freshly loaded state and build its write-set.
///
/// `position` is the trader's current holding in the requested option.
pub fn plan_trade(
    req: &TradeRequest,
    book: &MarketBook,
    balance: i64,
    position: Option<&Position>,
    tolerance: f64,
    now: DateTime<Utc>,
) -> Result<TradePlan, EngineError> {
    if !req.shares.is_finite() || req.shares <= 0.0 {
        return Err(EngineError::InvalidQuantity(req.shares));
    }
    if !req.client_price.is_finite() || req.client_price <= 0.0 {
        return Err(EngineError::InvalidPrice(req.client_price));
    }

    let market = &book.market;
    if !market.is_open_at(now) {
        return Err(EngineError::MarketClosed(market.id));
    }

    let index = book.option_index(req.option_id).ok_or(EngineError::UnknownOption {
        market_id: market.id,
        option_id: req.option_id,
    })?;

    let q = quote(req.side, &book.shares(), market.liquidity, index, req.shares)
        .map_err(|e| EngineError::from_quote(e, market.id, req.option_id))?;

    if !within_tolerance(q.total, req.client_price, tolerance) {
        return Err(EngineError::PriceChanged {
            quoted: req.client_price,
            current: q.total,
        });
    }

    let amount = settled_amount(req.side, q.total);
    let (held, average_price) = position
        .map(|p| (p.shares, p.average_price))
        .unwrap_or((0.0, 0.0));

    let (balance_delta, position_write) = match req.side {
        Side::Buy => {
            if balance < amount {
                return Err(EngineError::InsufficientFunds {
                    required: amount,
                    available: balance,
                });
            }
            let shares = held + req.shares;
            let average_price = (held * average_price + q.total) / shares;
            (-amount, PositionWrite::Upsert { shares, average_price })
        }
        Side::Sell => {
            if held + DUST_SHARES < req.shares {
                return Err(EngineError::InsufficientShares {
                    requested: req.shares,
                    held,
                });
            }
            let shares = held - req.shares;
            let write = if shares <= DUST_SHARES {
                PositionWrite::Delete
            } else {
                PositionWrite::Upsert { shares, average_price }
            };
            (amount, write)
        }
    };

    let probabilities = book
        .options
        .iter()
        .zip(&q.probabilities)
        .map(|(o, p)| (o.id, *p))
        .collect();

    let trade = Trade {
        id: Uuid::new_v4(),
        user_id: req.user_id,
        market_id: market.id,
        option_id: req.option_id,
        side: req.side,
        shares: req.shares,
        unit_price: q.unit_price,
        total: q.total,
        amount_settled: amount,
        created_at: now,
    };

    let write = TradeWriteSet {
        market_id: market.id,
        expected_version: market.version,
        user_id: req.user_id,
        balance_delta,
        option_id: req.option_id,
        option_shares: q.new_shares[index],
        probabilities,
        position: position_write,
        volume_delta: q.total,
        trade,
    };

    Ok(TradePlan { quote: q, write })
}
