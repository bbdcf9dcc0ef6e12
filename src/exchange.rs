use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::MarketStore;
use crate::errors::EngineError;
use crate::events::{MarketEvent, MarketResolved, OptionProbability, TradeSettled};
use crate::models::{Market, MarketBook, MarketOption, NewMarket, Side};
use crate::pricing::{probabilities, quote};
use crate::services::resolution::{self, ResolutionReport};
use crate::settlement::pipeline::{self, TradeReceipt};
use crate::settlement::plan::settled_amount;
use crate::settlement::{MarketLocks, SettlementConfig, TradeRequest};

/// Inbound quote request. Read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub market_id: Uuid,
    pub option_id: Uuid,
    pub side: Side,
    pub shares: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    pub market_id: Uuid,
    pub option_id: Uuid,
    pub side: Side,
    pub shares: f64,
    pub unit_price: f64,
    /// Cost of a buy or payout of a sell; submit this as `client_price`.
    pub total: f64,
    /// Whole units the trade would move on the balance. The slippage check
    /// compares `total`; this is what is actually charged or credited.
    pub amount_settled: i64,
    pub probabilities: Vec<OptionProbability>,
}

/// Entry point the service boundary calls into: markets, quotes, trades,
/// resolution. Cheap to clone.
#[derive(Clone)]
pub struct Exchange {
    store: Arc<dyn MarketStore>,
    locks: MarketLocks,
    config: SettlementConfig,
    events: broadcast::Sender<MarketEvent>,
}

impl Exchange {
    pub fn new(
        store: Arc<dyn MarketStore>,
        config: SettlementConfig,
        events: broadcast::Sender<MarketEvent>,
    ) -> Self {
        Self {
            store,
            locks: MarketLocks::new(),
            config,
            events,
        }
    }

    pub fn store(&self) -> &dyn MarketStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: MarketEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// Create a market and all of its outcomes at uniform probability.
    pub async fn create_market(&self, new: NewMarket) -> Result<MarketBook, EngineError> {
        let question = new.question.trim();
        if question.is_empty() {
            return Err(EngineError::InvalidMarket("question must not be empty".into()));
        }
        if !new.liquidity.is_finite() || new.liquidity <= 0.0 {
            return Err(EngineError::InvalidLiquidity(new.liquidity));
        }
        if new.options.len() < 2 {
            return Err(EngineError::InvalidMarket("a market needs at least two options".into()));
        }
        let mut seen = HashSet::new();
        for label in &new.options {
            let label = label.trim();
            if label.is_empty() {
                return Err(EngineError::InvalidMarket("option labels must not be empty".into()));
            }
            if !seen.insert(label.to_lowercase()) {
                return Err(EngineError::InvalidMarket(format!("duplicate option label: {label}")));
            }
        }
        let now = Utc::now();
        if new.close_at <= now {
            return Err(EngineError::InvalidMarket("close time must be in the future".into()));
        }

        let market_id = Uuid::new_v4();
        let market = Market {
            id: market_id,
            question: question.to_string(),
            category: new.category,
            country: new.country,
            close_at: new.close_at,
            liquidity: new.liquidity,
            resolved: false,
            winning_option_id: None,
            volume: 0.0,
            version: 0,
            created_at: now,
            resolved_at: None,
        };

        let initial = probabilities(&vec![0.0; new.options.len()], new.liquidity);
        let options = new
            .options
            .iter()
            .zip(initial)
            .enumerate()
            .map(|(i, (label, probability))| MarketOption {
                id: Uuid::new_v4(),
                market_id,
                label: label.trim().to_string(),
                ordinal: i as i32,
                shares: 0.0,
                probability,
            })
            .collect();

        let book = MarketBook::new(market, options);
        self.store.create_market(&book).await?;

        tracing::info!(
            market_id = %market_id,
            outcomes = book.options.len(),
            liquidity = book.market.liquidity,
            "Market created"
        );

        Ok(book)
    }

    pub async fn market(&self, market_id: Uuid) -> Result<MarketBook, EngineError> {
        self.store
            .load_book(market_id)
            .await?
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    /// Price a hypothetical trade against the current book. Commits nothing.
    pub async fn quote(&self, req: &QuoteRequest) -> Result<QuoteResponse, EngineError> {
        let book = self.market(req.market_id).await?;
        if !book.market.is_open_at(Utc::now()) {
            return Err(EngineError::MarketClosed(req.market_id));
        }
        let index = book.option_index(req.option_id).ok_or(EngineError::UnknownOption {
            market_id: req.market_id,
            option_id: req.option_id,
        })?;

        let q = quote(req.side, &book.shares(), book.market.liquidity, index, req.shares)
            .map_err(|e| EngineError::from_quote(e, req.market_id, req.option_id))?;

        tracing::debug!(
            market_id = %req.market_id,
            option_id = %req.option_id,
            side = %req.side,
            shares = req.shares,
            total = q.total,
            "Quote computed"
        );

        let probabilities = book
            .options
            .iter()
            .zip(&q.probabilities)
            .map(|(o, p)| OptionProbability {
                option_id: o.id,
                probability: *p,
            })
            .collect();

        Ok(QuoteResponse {
            market_id: req.market_id,
            option_id: req.option_id,
            side: req.side,
            shares: req.shares,
            unit_price: q.unit_price,
            total: q.total,
            amount_settled: settled_amount(req.side, q.total),
            probabilities,
        })
    }

    /// Run a trade through the settlement pipeline and announce it.
    pub async fn submit_trade(&self, req: &TradeRequest) -> Result<TradeReceipt, EngineError> {
        match pipeline::settle(self.store.as_ref(), &self.locks, &self.config, req).await {
            Ok(receipt) => {
                self.publish(MarketEvent::TradeSettled(TradeSettled {
                    trade: receipt.trade.clone(),
                    probabilities: receipt.probabilities.clone(),
                }));
                Ok(receipt)
            }
            Err(e) => {
                counter!("trades_rejected_total", "reason" => e.reason()).increment(1);
                match &e {
                    EngineError::Persistence(err) => tracing::error!(
                        error = ?err,
                        market_id = %req.market_id,
                        user_id = %req.user_id,
                        "Settlement failed in the store"
                    ),
                    _ => tracing::warn!(
                        reason = e.reason(),
                        error = %e,
                        market_id = %req.market_id,
                        user_id = %req.user_id,
                        "Trade rejected"
                    ),
                }
                Err(e)
            }
        }
    }

    /// Resolve a market on `winning_option_id` and pay its winners.
    pub async fn resolve_market(
        &self,
        market_id: Uuid,
        winning_option_id: Uuid,
    ) -> Result<ResolutionReport, EngineError> {
        let (book, report) = resolution::resolve_market(
            self.store.as_ref(),
            &self.locks,
            &self.config,
            market_id,
            winning_option_id,
        )
        .await?;

        let winning_label = book
            .options
            .iter()
            .find(|o| o.id == winning_option_id)
            .map(|o| o.label.clone())
            .unwrap_or_default();

        self.publish(MarketEvent::MarketResolved(MarketResolved {
            market_id,
            question: book.market.question.clone(),
            winning_option_id,
            winning_label,
            payouts: report.clone(),
        }));

        Ok(report)
    }

    /// Re-run payouts for a resolved market; already-paid winners are skipped.
    pub async fn settle_payouts(&self, market_id: Uuid) -> Result<ResolutionReport, EngineError> {
        resolution::settle_payouts(self.store.as_ref(), market_id).await
    }

    /// Credit a user's balance administratively.
    pub async fn grant(
        &self,
        user_id: Uuid,
        amount: i64,
        memo: Option<String>,
    ) -> Result<i64, EngineError> {
        if amount <= 0 {
            return Err(EngineError::InvalidQuantity(amount as f64));
        }
        let new_balance = self.store.grant(user_id, amount, memo).await?;
        tracing::info!(user_id = %user_id, amount, new_balance, "Balance granted");
        Ok(new_balance)
    }
}
