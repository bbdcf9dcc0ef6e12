mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use oddsmith::errors::EngineError;
use oddsmith::exchange::QuoteRequest;
use oddsmith::models::ledger::ledger_kind;
use oddsmith::models::Side;

use common::new_market;

#[tokio::test]
async fn test_create_market_starts_uniform() {
    let exchange = common::memory_exchange();
    let book = exchange
        .create_market(new_market(&["Red", "Green", "Blue"], 75.0))
        .await
        .unwrap();

    assert_eq!(book.options.len(), 3);
    assert_eq!(book.market.version, 0);
    assert!(!book.market.resolved);
    for (i, option) in book.options.iter().enumerate() {
        assert_eq!(option.ordinal, i as i32);
        assert_eq!(option.shares, 0.0);
        assert!((option.probability - 1.0 / 3.0).abs() < 1e-12);
    }

    let listed = exchange.store().list_markets().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].market.id, book.market.id);
    assert_eq!(listed[0].options.len(), 3);
}

#[tokio::test]
async fn test_create_market_validation() {
    let exchange = common::memory_exchange();

    let mut blank = new_market(&["Yes", "No"], 100.0);
    blank.question = "   ".into();
    assert!(matches!(
        exchange.create_market(blank).await,
        Err(EngineError::InvalidMarket(_))
    ));

    for b in [0.0, -5.0, f64::INFINITY] {
        assert!(matches!(
            exchange.create_market(new_market(&["Yes", "No"], b)).await,
            Err(EngineError::InvalidLiquidity(_))
        ));
    }

    assert!(matches!(
        exchange.create_market(new_market(&["Only"], 100.0)).await,
        Err(EngineError::InvalidMarket(_))
    ));

    assert!(matches!(
        exchange.create_market(new_market(&["Yes", "yes "], 100.0)).await,
        Err(EngineError::InvalidMarket(_))
    ));

    let mut past = new_market(&["Yes", "No"], 100.0);
    past.close_at = Utc::now() - Duration::minutes(1);
    assert!(matches!(
        exchange.create_market(past).await,
        Err(EngineError::InvalidMarket(_))
    ));

    assert!(exchange.store().list_markets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quote_commits_nothing() {
    let exchange = common::memory_exchange();
    let book = common::seed_binary_market(&exchange).await;

    let req = QuoteRequest {
        market_id: book.market.id,
        option_id: book.options[0].id,
        side: Side::Buy,
        shares: 25.0,
    };
    let first = exchange.quote(&req).await.unwrap();
    let second = exchange.quote(&req).await.unwrap();

    assert_eq!(first.total, second.total);
    assert!(first.probabilities[0].probability > 0.5);
    let after = exchange.market(book.market.id).await.unwrap();
    assert_eq!(after.market.version, 0);
    assert_eq!(after.options[0].shares, 0.0);
}

#[tokio::test]
async fn test_grant_records_ledger_entry() {
    let exchange = common::memory_exchange();
    let user = Uuid::new_v4();

    assert_eq!(exchange.store().balance(user).await.unwrap(), 0);
    assert_eq!(exchange.grant(user, 250, Some("welcome".into())).await.unwrap(), 250);
    assert_eq!(exchange.grant(user, 50, None).await.unwrap(), 300);

    let ledger = exchange.store().ledger_for_user(user).await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().all(|e| e.kind == ledger_kind::GRANT));
    assert_eq!(ledger.iter().map(|e| e.amount).sum::<i64>(), 300);

    assert!(matches!(
        exchange.grant(user, 0, None).await,
        Err(EngineError::InvalidQuantity(_))
    ));
    assert_eq!(exchange.store().balance(user).await.unwrap(), 300);
}

#[tokio::test]
async fn test_grant_past_i64_max_is_rejected() {
    let exchange = common::memory_exchange();
    let user = Uuid::new_v4();

    assert_eq!(exchange.grant(user, i64::MAX, None).await.unwrap(), i64::MAX);
    let err = exchange.grant(user, 1, None).await.unwrap_err();
    assert!(matches!(err, EngineError::BalanceOverflow(id) if id == user));

    assert_eq!(exchange.store().balance(user).await.unwrap(), i64::MAX);
    assert_eq!(exchange.store().ledger_for_user(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_quote_reports_settled_amount() {
    let exchange = common::memory_exchange();
    let book = common::seed_binary_market(&exchange).await;
    let user = common::seed_user(&exchange, 100).await;
    let yes = book.options[0].id;

    // A tenth of a share costs about 0.05 but is charged a whole unit.
    let buy = exchange
        .quote(&QuoteRequest {
            market_id: book.market.id,
            option_id: yes,
            side: Side::Buy,
            shares: 0.1,
        })
        .await
        .unwrap();
    assert!(buy.total < 0.1);
    assert_eq!(buy.amount_settled, 1);

    let receipt = common::quote_and_trade(&exchange, user, book.market.id, yes, Side::Buy, 0.1)
        .await
        .unwrap();
    assert_eq!(receipt.trade.amount_settled, buy.amount_settled);
    assert_eq!(receipt.new_balance, 99);

    // Selling it back credits the floor, which is nothing.
    let sell = exchange
        .quote(&QuoteRequest {
            market_id: book.market.id,
            option_id: yes,
            side: Side::Sell,
            shares: 0.1,
        })
        .await
        .unwrap();
    assert_eq!(sell.amount_settled, 0);
}
