use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::Position;

pub async fn get_position<'e>(
    db: impl PgExecutor<'e>,
    user_id: Uuid,
    option_id: Uuid,
) -> anyhow::Result<Option<Position>> {
    let row = sqlx::query_as::<_, Position>(
        "SELECT * FROM positions WHERE user_id = $1 AND option_id = $2",
    )
    .bind(user_id)
    .bind(option_id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

/// Write the full state of a position, creating it if needed.
pub async fn upsert_position<'e>(db: impl PgExecutor<'e>, position: &Position) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO positions (user_id, market_id, option_id, shares, average_price, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, option_id) DO UPDATE
            SET shares = $4, average_price = $5, updated_at = $6
        "#,
    )
    .bind(position.user_id)
    .bind(position.market_id)
    .bind(position.option_id)
    .bind(position.shares)
    .bind(position.average_price)
    .bind(position.updated_at)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn delete_position<'e>(db: impl PgExecutor<'e>, user_id: Uuid, option_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM positions WHERE user_id = $1 AND option_id = $2")
        .bind(user_id)
        .bind(option_id)
        .execute(db)
        .await?;

    Ok(())
}

/// Get all positions held by a user, most recently touched first.
pub async fn get_positions_for_user<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> anyhow::Result<Vec<Position>> {
    let rows = sqlx::query_as::<_, Position>(
        "SELECT * FROM positions WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

/// Get every holder of one outcome.
pub async fn get_positions_for_option<'e>(
    db: impl PgExecutor<'e>,
    option_id: Uuid,
) -> anyhow::Result<Vec<Position>> {
    let rows = sqlx::query_as::<_, Position>(
        "SELECT * FROM positions WHERE option_id = $1 AND shares > 0",
    )
    .bind(option_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}
