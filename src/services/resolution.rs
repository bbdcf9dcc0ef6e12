use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{MarketStore, PayoutOutcome};
use crate::errors::EngineError;
use crate::models::MarketBook;
use crate::pricing::collapsed;
use crate::settlement::write_set::{PayoutWriteSet, ResolutionWriteSet};
use crate::settlement::{MarketLocks, SettlementConfig};

/// Summary of one payout run over a resolved market.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub market_id: Uuid,
    pub winning_option_id: Uuid,
    /// Winners credited during this run.
    pub winners_paid: usize,
    /// Winners skipped because an earlier run already paid them.
    pub already_paid: usize,
    /// Winners whose payout failed; re-run `settle_payouts` to retry them.
    pub failed: usize,
    pub total_paid: i64,
    /// Sum of fractional share value not paid because balances are whole units.
    pub unpaid_remainder: f64,
    /// The payout run stopped before visiting every winner. The resolution
    /// itself is committed; re-run `settle_payouts` to finish.
    pub incomplete: bool,
}

/// Freeze a market on its winning outcome, then pay every winner.
///
/// The resolution itself is one atomic commit. Payouts follow one user at a
/// time; see [`settle_payouts`].
pub async fn resolve_market(
    store: &dyn MarketStore,
    locks: &MarketLocks,
    config: &SettlementConfig,
    market_id: Uuid,
    winning_option_id: Uuid,
) -> Result<(MarketBook, ResolutionReport), EngineError> {
    let book = {
        let _guard = locks.acquire(market_id, config.lock_timeout).await?;

        let book = store
            .load_book(market_id)
            .await?
            .ok_or(EngineError::MarketNotFound(market_id))?;
        if book.market.resolved {
            return Err(EngineError::AlreadyResolved(market_id));
        }

        let winner = book.option_index(winning_option_id).ok_or(EngineError::UnknownOption {
            market_id,
            option_id: winning_option_id,
        })?;

        let now = Utc::now();
        if now < book.market.close_at {
            tracing::warn!(
                market_id = %market_id,
                close_at = %book.market.close_at,
                "Resolving market before its close time"
            );
        }

        let probabilities: Vec<(Uuid, f64)> = book
            .options
            .iter()
            .zip(collapsed(book.options.len(), winner))
            .map(|(o, p)| (o.id, p))
            .collect();

        store
            .commit_resolution(&ResolutionWriteSet {
                market_id,
                expected_version: book.market.version,
                winning_option_id,
                probabilities: probabilities.clone(),
                resolved_at: now,
            })
            .await?;

        counter!("markets_resolved_total").increment(1);
        tracing::info!(
            market_id = %market_id,
            winning_option_id = %winning_option_id,
            "Market resolved"
        );

        resolved_book(book, winning_option_id, &probabilities, now)
    };

    // From here on the resolution is committed: payout trouble is reported,
    // never returned as an error.
    let report = match settle_payouts(store, market_id).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(
                error = %e,
                market_id = %market_id,
                "Payout run aborted after resolution, will need a re-run"
            );
            ResolutionReport {
                market_id,
                winning_option_id,
                incomplete: true,
                ..Default::default()
            }
        }
    };
    Ok((book, report))
}

/// The committed state of `book` after resolving on `winning_option_id`.
fn resolved_book(
    mut book: MarketBook,
    winning_option_id: Uuid,
    probabilities: &[(Uuid, f64)],
    resolved_at: DateTime<Utc>,
) -> MarketBook {
    for option in book.options.iter_mut() {
        if let Some((_, p)) = probabilities.iter().find(|(id, _)| *id == option.id) {
            option.probability = *p;
        }
    }
    book.market.resolved = true;
    book.market.winning_option_id = Some(winning_option_id);
    book.market.resolved_at = Some(resolved_at);
    book.market.version += 1;
    book
}

/// Pay `floor(shares)` units to every holder of the winning outcome.
///
/// Each payout (balance credit + payout ledger entry) is atomic on its own,
/// and the ledger entry marks the user as paid, so this is safe to re-run
/// after a partial failure.
pub async fn settle_payouts(
    store: &dyn MarketStore,
    market_id: Uuid,
) -> Result<ResolutionReport, EngineError> {
    let book = store
        .load_book(market_id)
        .await?
        .ok_or(EngineError::MarketNotFound(market_id))?;
    let winning_option_id = match (book.market.resolved, book.market.winning_option_id) {
        (true, Some(id)) => id,
        _ => return Err(EngineError::NotResolved(market_id)),
    };

    let mut report = ResolutionReport {
        market_id,
        winning_option_id,
        ..Default::default()
    };

    let holders = store.positions_for_option(winning_option_id).await?;

    for position in holders.iter().filter(|p| p.shares > 0.0) {
        let amount = position.shares.floor();
        let write = PayoutWriteSet {
            entry_id: Uuid::new_v4(),
            market_id,
            option_id: winning_option_id,
            user_id: position.user_id,
            shares: position.shares,
            amount: amount as i64,
            remainder: position.shares - amount,
            created_at: Utc::now(),
        };

        match store.commit_payout(&write).await {
            Ok(PayoutOutcome::Paid { new_balance }) => {
                report.winners_paid += 1;
                report.total_paid += write.amount;
                report.unpaid_remainder += write.remainder;
                counter!("payouts_total").increment(1);
                tracing::info!(
                    market_id = %market_id,
                    user_id = %position.user_id,
                    shares = position.shares,
                    amount = write.amount,
                    new_balance,
                    "Winner paid"
                );
            }
            Ok(PayoutOutcome::AlreadyPaid) => {
                report.already_paid += 1;
                tracing::debug!(
                    market_id = %market_id,
                    user_id = %position.user_id,
                    "Winner already paid, skipping"
                );
            }
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    error = %e,
                    market_id = %market_id,
                    user_id = %position.user_id,
                    "Failed to pay winner, will need a re-run"
                );
            }
        }
    }

    report.incomplete = report.failed > 0;

    tracing::info!(
        market_id = %market_id,
        winners_paid = report.winners_paid,
        already_paid = report.already_paid,
        failed = report.failed,
        total_paid = report.total_paid,
        unpaid_remainder = report.unpaid_remainder,
        "Payout run finished"
    );

    Ok(report)
}
