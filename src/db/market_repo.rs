use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{Market, MarketOption};

/// Insert a market row.
pub async fn insert_market<'e>(db: impl PgExecutor<'e>, market: &Market) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO markets (id, question, category, country, close_at, liquidity,
                             resolved, winning_option_id, volume, version, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(market.id)
    .bind(&market.question)
    .bind(&market.category)
    .bind(&market.country)
    .bind(market.close_at)
    .bind(market.liquidity)
    .bind(market.resolved)
    .bind(market.winning_option_id)
    .bind(market.volume)
    .bind(market.version)
    .bind(market.created_at)
    .execute(db)
    .await?;

    Ok(())
}

/// Insert one outcome of a market.
pub async fn insert_option<'e>(db: impl PgExecutor<'e>, option: &MarketOption) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO market_options (id, market_id, label, ordinal, shares, probability)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(option.id)
    .bind(option.market_id)
    .bind(&option.label)
    .bind(option.ordinal)
    .bind(option.shares)
    .bind(option.probability)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn get_market<'e>(db: impl PgExecutor<'e>, market_id: Uuid) -> anyhow::Result<Option<Market>> {
    let row = sqlx::query_as::<_, Market>("SELECT * FROM markets WHERE id = $1")
        .bind(market_id)
        .fetch_optional(db)
        .await?;

    Ok(row)
}

/// Get all markets, newest first.
pub async fn list_markets<'e>(db: impl PgExecutor<'e>) -> anyhow::Result<Vec<Market>> {
    let rows = sqlx::query_as::<_, Market>("SELECT * FROM markets ORDER BY created_at DESC")
        .fetch_all(db)
        .await?;

    Ok(rows)
}

/// Get the outcomes of one market in share-vector order.
pub async fn get_options<'e>(db: impl PgExecutor<'e>, market_id: Uuid) -> anyhow::Result<Vec<MarketOption>> {
    let rows = sqlx::query_as::<_, MarketOption>(
        "SELECT * FROM market_options WHERE market_id = $1 ORDER BY ordinal",
    )
    .bind(market_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

/// Get the outcomes of several markets at once.
pub async fn get_options_for_markets<'e>(
    db: impl PgExecutor<'e>,
    market_ids: &[Uuid],
) -> anyhow::Result<Vec<MarketOption>> {
    let rows = sqlx::query_as::<_, MarketOption>(
        "SELECT * FROM market_options WHERE market_id = ANY($1) ORDER BY market_id, ordinal",
    )
    .bind(market_ids)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

/// Compare-and-swap the market version and add traded volume.
///
/// Returns `false` when the market is resolved, missing, or has moved past
/// `expected_version`. On success the row stays locked until the enclosing
/// transaction ends.
pub async fn advance_version<'e>(
    db: impl PgExecutor<'e>,
    market_id: Uuid,
    expected_version: i64,
    volume_delta: f64,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE markets
        SET version = version + 1, volume = volume + $3
        WHERE id = $1 AND version = $2 AND NOT resolved
        "#,
    )
    .bind(market_id)
    .bind(expected_version)
    .bind(volume_delta)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark a market resolved if it is still at `expected_version`.
pub async fn mark_resolved<'e>(
    db: impl PgExecutor<'e>,
    market_id: Uuid,
    expected_version: i64,
    winning_option_id: Uuid,
    resolved_at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE markets
        SET resolved = TRUE, winning_option_id = $3, resolved_at = $4, version = version + 1
        WHERE id = $1 AND version = $2 AND NOT resolved
        "#,
    )
    .bind(market_id)
    .bind(expected_version)
    .bind(winning_option_id)
    .bind(resolved_at)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_option_shares<'e>(db: impl PgExecutor<'e>, option_id: Uuid, shares: f64) -> anyhow::Result<()> {
    sqlx::query("UPDATE market_options SET shares = $2 WHERE id = $1")
        .bind(option_id)
        .bind(shares)
        .execute(db)
        .await?;

    Ok(())
}

pub async fn set_option_probability<'e>(
    db: impl PgExecutor<'e>,
    option_id: Uuid,
    probability: f64,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE market_options SET probability = $2 WHERE id = $1")
        .bind(option_id)
        .bind(probability)
        .execute(db)
        .await?;

    Ok(())
}
