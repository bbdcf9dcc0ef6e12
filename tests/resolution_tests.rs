mod common;

use std::sync::atomic::Ordering;

use chrono::Utc;
use uuid::Uuid;

use oddsmith::errors::EngineError;
use oddsmith::events::MarketEvent;
use oddsmith::models::ledger::ledger_kind;
use oddsmith::models::Side;
use oddsmith::settlement::SettlementConfig;

use common::{quote_and_trade, seed_binary_market, seed_user, FlakyStore};

#[tokio::test]
async fn test_resolution_pays_winners_once() {
    let exchange = common::memory_exchange();
    let book = seed_binary_market(&exchange).await;
    let market_id = book.market.id;
    let (yes, no) = (book.options[0].id, book.options[1].id);

    let alice = seed_user(&exchange, 100).await;
    let bob = seed_user(&exchange, 100).await;
    let carol = seed_user(&exchange, 100).await;

    quote_and_trade(&exchange, alice, market_id, yes, Side::Buy, 50.0).await.unwrap();
    quote_and_trade(&exchange, bob, market_id, yes, Side::Buy, 10.5).await.unwrap();
    quote_and_trade(&exchange, carol, market_id, no, Side::Buy, 20.0).await.unwrap();

    let store = exchange.store();
    let alice_before = store.balance(alice).await.unwrap();
    let bob_before = store.balance(bob).await.unwrap();
    let carol_before = store.balance(carol).await.unwrap();

    let report = exchange.resolve_market(market_id, yes).await.expect("Resolution should succeed");
    assert_eq!(report.winning_option_id, yes);
    assert_eq!(report.winners_paid, 2);
    assert_eq!(report.already_paid, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(report.total_paid, 60);
    assert!((report.unpaid_remainder - 0.5).abs() < 1e-9);

    assert_eq!(store.balance(alice).await.unwrap(), alice_before + 50);
    assert_eq!(store.balance(bob).await.unwrap(), bob_before + 10);
    assert_eq!(store.balance(carol).await.unwrap(), carol_before);

    let resolved = exchange.market(market_id).await.unwrap();
    assert!(resolved.market.resolved);
    assert_eq!(resolved.market.winning_option_id, Some(yes));
    assert!(resolved.market.resolved_at.is_some());
    assert_eq!(resolved.options[0].probability, 1.0);
    assert_eq!(resolved.options[1].probability, 0.0);

    let payouts: Vec<_> = store
        .ledger_for_user(bob)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == ledger_kind::PAYOUT)
        .collect();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].amount, 10);
    assert_eq!(payouts[0].market_id, Some(market_id));
    assert!((payouts[0].remainder.unwrap() - 0.5).abs() < 1e-9);

    // A second run finds everyone already paid.
    let rerun = exchange.settle_payouts(market_id).await.unwrap();
    assert_eq!(rerun.winners_paid, 0);
    assert_eq!(rerun.already_paid, 2);
    assert_eq!(rerun.total_paid, 0);
    assert_eq!(store.balance(alice).await.unwrap(), alice_before + 50);
}

#[tokio::test]
async fn test_resolved_market_is_frozen() {
    let exchange = common::memory_exchange();
    let book = seed_binary_market(&exchange).await;
    let market_id = book.market.id;
    let (yes, no) = (book.options[0].id, book.options[1].id);
    let user = seed_user(&exchange, 100).await;

    quote_and_trade(&exchange, user, market_id, no, Side::Buy, 10.0).await.unwrap();
    exchange.resolve_market(market_id, yes).await.unwrap();

    let again = exchange.resolve_market(market_id, no).await;
    assert!(matches!(again, Err(EngineError::AlreadyResolved(id)) if id == market_id));

    let trade = quote_and_trade(&exchange, user, market_id, no, Side::Sell, 10.0).await;
    assert!(matches!(trade, Err(EngineError::MarketClosed(_))));

    // The losing position is left in place, unpaid.
    let position = exchange.store().position(user, no).await.unwrap().unwrap();
    assert!((position.shares - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_resolution_rejects_bad_input() {
    let exchange = common::memory_exchange();
    let book = seed_binary_market(&exchange).await;

    let unknown = exchange.resolve_market(book.market.id, Uuid::new_v4()).await;
    assert!(matches!(unknown, Err(EngineError::UnknownOption { .. })));

    let missing = exchange.resolve_market(Uuid::new_v4(), book.options[0].id).await;
    assert!(matches!(missing, Err(EngineError::MarketNotFound(_))));

    let early = exchange.settle_payouts(book.market.id).await;
    assert!(matches!(early, Err(EngineError::NotResolved(_))));

    assert!(!exchange.market(book.market.id).await.unwrap().market.resolved);
}

#[tokio::test]
async fn test_failed_payout_is_finished_by_rerun() {
    let store = FlakyStore::new();
    let exchange = common::exchange_with(store.clone(), SettlementConfig::default());
    let book = seed_binary_market(&exchange).await;
    let market_id = book.market.id;
    let yes = book.options[0].id;

    let alice = seed_user(&exchange, 100).await;
    let bob = seed_user(&exchange, 100).await;
    quote_and_trade(&exchange, alice, market_id, yes, Side::Buy, 20.0).await.unwrap();
    quote_and_trade(&exchange, bob, market_id, yes, Side::Buy, 30.0).await.unwrap();
    let bob_before = exchange.store().balance(bob).await.unwrap();

    *store.fail_payouts_for.lock() = Some(bob);
    let report = exchange.resolve_market(market_id, yes).await.unwrap();
    assert_eq!(report.winners_paid, 1);
    assert_eq!(report.failed, 1);
    assert!(report.incomplete);
    assert_eq!(exchange.store().balance(bob).await.unwrap(), bob_before);

    *store.fail_payouts_for.lock() = None;
    let rerun = exchange.settle_payouts(market_id).await.unwrap();
    assert_eq!(rerun.winners_paid, 1);
    assert_eq!(rerun.already_paid, 1);
    assert_eq!(rerun.failed, 0);
    assert!(!rerun.incomplete);
    assert_eq!(rerun.total_paid, 30);
    assert_eq!(exchange.store().balance(bob).await.unwrap(), bob_before + 30);
}

#[tokio::test]
async fn test_resolution_is_published() {
    let exchange = common::memory_exchange();
    let book = seed_binary_market(&exchange).await;
    let mut rx = exchange.subscribe();

    exchange
        .resolve_market(book.market.id, book.options[1].id)
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        MarketEvent::MarketResolved(event) => {
            assert_eq!(event.market_id, book.market.id);
            assert_eq!(event.winning_label, "No");
            assert_eq!(event.payouts.winners_paid, 0);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_aborted_payout_run_still_announces_resolution() {
    let store = FlakyStore::new();
    let exchange = common::exchange_with(store.clone(), SettlementConfig::default());
    let book = seed_binary_market(&exchange).await;
    let market_id = book.market.id;
    let yes = book.options[0].id;
    let user = seed_user(&exchange, 100).await;
    quote_and_trade(&exchange, user, market_id, yes, Side::Buy, 20.0).await.unwrap();
    let before = exchange.store().balance(user).await.unwrap();

    let mut rx = exchange.subscribe();
    store.fail_holder_reads.store(true, Ordering::SeqCst);

    let report = exchange
        .resolve_market(market_id, yes)
        .await
        .expect("Committed resolution should not surface as an error");
    assert!(report.incomplete);
    assert_eq!(report.winners_paid, 0);
    assert!(exchange.market(market_id).await.unwrap().market.resolved);

    match rx.try_recv() {
        Ok(MarketEvent::MarketResolved(event)) => {
            assert_eq!(event.market_id, market_id);
            assert_eq!(event.winning_option_id, yes);
            assert!(event.payouts.incomplete);
        }
        other => panic!("expected MarketResolved, got {other:?}"),
    }

    store.fail_holder_reads.store(false, Ordering::SeqCst);
    let rerun = exchange.settle_payouts(market_id).await.unwrap();
    assert_eq!(rerun.winners_paid, 1);
    assert!(!rerun.incomplete);
    assert_eq!(exchange.store().balance(user).await.unwrap(), before + 20);
}

#[tokio::test]
async fn test_resolving_before_close_time_is_allowed() {
    let exchange = common::memory_exchange();
    let book = seed_binary_market(&exchange).await;
    assert!(Utc::now() < book.market.close_at);

    exchange
        .resolve_market(book.market.id, book.options[0].id)
        .await
        .expect("Early resolution should succeed");

    let resolved = exchange.market(book.market.id).await.unwrap();
    assert!(resolved.market.resolved);
    let resolved_at = resolved.market.resolved_at.unwrap();
    assert!(resolved_at < resolved.market.close_at);
}

#[tokio::test]
async fn test_payout_past_i64_max_is_left_unpaid() {
    let exchange = common::memory_exchange();
    let book = seed_binary_market(&exchange).await;
    let market_id = book.market.id;
    let yes = book.options[0].id;
    let user = seed_user(&exchange, 100).await;

    quote_and_trade(&exchange, user, market_id, yes, Side::Buy, 20.0).await.unwrap();
    let balance = exchange.store().balance(user).await.unwrap();
    exchange.grant(user, i64::MAX - balance - 5, None).await.unwrap();

    let report = exchange.resolve_market(market_id, yes).await.unwrap();
    assert_eq!(report.winners_paid, 0);
    assert_eq!(report.failed, 1);
    assert!(report.incomplete);
    assert_eq!(exchange.store().balance(user).await.unwrap(), i64::MAX - 5);
    assert!(exchange
        .store()
        .ledger_for_user(user)
        .await
        .unwrap()
        .iter()
        .all(|e| e.kind != ledger_kind::PAYOUT));
}
