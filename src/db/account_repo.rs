use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::LedgerEntry;

/// Current balance; zero when the user has no account row yet.
pub async fn get_balance<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> anyhow::Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT amount FROM balances WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    Ok(row.map(|r| r.0).unwrap_or(0))
}

/// Add `amount` (>= 0) to a balance, opening the account if needed.
pub async fn credit<'e>(db: impl PgExecutor<'e>, user_id: Uuid, amount: i64) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO balances (user_id, amount, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (user_id) DO UPDATE
            SET amount = balances.amount + EXCLUDED.amount, updated_at = NOW()
        RETURNING amount
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(db)
    .await?;

    Ok(row.0)
}

/// Subtract `amount` (>= 0) only if the balance covers it.
///
/// Returns `None` when funds are insufficient; nothing is changed then.
pub async fn debit<'e>(db: impl PgExecutor<'e>, user_id: Uuid, amount: i64) -> anyhow::Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE balances
        SET amount = amount - $2, updated_at = NOW()
        WHERE user_id = $1 AND amount >= $2
        RETURNING amount
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(db)
    .await?;

    Ok(row.map(|r| r.0))
}

/// Append a ledger entry. Returns `false` if it collided with an existing
/// payout marker for the same (market, user).
pub async fn insert_ledger_entry<'e>(db: impl PgExecutor<'e>, entry: &LedgerEntry) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO ledger_entries (id, user_id, kind, amount, market_id, option_id,
                                    shares, remainder, memo, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(entry.id)
    .bind(entry.user_id)
    .bind(&entry.kind)
    .bind(entry.amount)
    .bind(entry.market_id)
    .bind(entry.option_id)
    .bind(entry.shares)
    .bind(entry.remainder)
    .bind(&entry.memo)
    .bind(entry.created_at)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_ledger_for_user<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> anyhow::Result<Vec<LedgerEntry>> {
    let rows = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM ledger_entries WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}
