use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Trade;

/// Append a settled trade.
pub async fn insert_trade<'e>(db: impl PgExecutor<'e>, trade: &Trade) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO trades (id, user_id, market_id, option_id, side, shares,
                            unit_price, total, amount_settled, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(trade.id)
    .bind(trade.user_id)
    .bind(trade.market_id)
    .bind(trade.option_id)
    .bind(trade.side.as_str())
    .bind(trade.shares)
    .bind(trade.unit_price)
    .bind(trade.total)
    .bind(trade.amount_settled)
    .bind(trade.created_at)
    .execute(db)
    .await?;

    Ok(())
}

/// Get the N most recent trades in a market.
pub async fn get_trades_for_market<'e>(
    db: impl PgExecutor<'e>,
    market_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<Trade>> {
    let trades = sqlx::query_as::<_, Trade>(
        "SELECT * FROM trades WHERE market_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(market_id)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(trades)
}

/// Get the N most recent trades by a user.
pub async fn get_trades_for_user<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<Trade>> {
    let trades = sqlx::query_as::<_, Trade>(
        "SELECT * FROM trades WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(trades)
}
