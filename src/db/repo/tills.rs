//! Till, movement, and reconciliation queries.

use crate::domain::{Movement, OperatorId, Reconciliation, Till, TillId};
use crate::error::CoreError;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Executor, Row};

use super::{parse_col, parse_opt_col};

const TILL_COLUMNS: &str =
    "id, operator_id, opening_balance, current_balance, state, opened_at, closed_at, version";

fn till_from_row(row: &SqliteRow) -> Result<Till, CoreError> {
    let operator_id: String = row.try_get("operator_id")?;
    Ok(Till {
        id: parse_col(row, "id")?,
        operator_id: OperatorId::new(operator_id),
        opening_balance: parse_col(row, "opening_balance")?,
        current_balance: parse_col(row, "current_balance")?,
        state: parse_col(row, "state")?,
        opened_at: parse_col(row, "opened_at")?,
        closed_at: parse_opt_col(row, "closed_at")?,
        version: row.try_get("version")?,
    })
}

fn movement_from_row(row: &SqliteRow) -> Result<Movement, CoreError> {
    Ok(Movement {
        id: parse_col(row, "id")?,
        till_id: parse_col(row, "till_id")?,
        direction: parse_col(row, "direction")?,
        amount: parse_col(row, "amount")?,
        balance_before: parse_col(row, "balance_before")?,
        balance_after: parse_col(row, "balance_after")?,
        reason: row.try_get("reason")?,
        created_at: parse_col(row, "created_at")?,
    })
}

fn reconciliation_from_row(row: &SqliteRow) -> Result<Reconciliation, CoreError> {
    Ok(Reconciliation {
        till_id: parse_col(row, "till_id")?,
        physical_count: parse_col(row, "physical_count")?,
        system_balance: parse_col(row, "system_balance")?,
        variance: parse_col(row, "variance")?,
        outcome: parse_col(row, "outcome")?,
        notes: row.try_get("notes")?,
        closed_at: parse_col(row, "closed_at")?,
    })
}

pub(super) async fn fetch_till<'e, E>(executor: E, id: TillId) -> Result<Option<Till>, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM tills WHERE id = ?", TILL_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(till_from_row).transpose()
}

pub(super) async fn fetch_open_till<'e, E>(
    executor: E,
    operator_id: &OperatorId,
) -> Result<Option<Till>, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM tills WHERE operator_id = ? AND state = 'open'",
        TILL_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(operator_id.as_str())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(till_from_row).transpose()
}

pub(super) async fn insert_till<'e, E>(executor: E, till: &Till) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO tills (
            id, operator_id, opening_balance, current_balance, state, opened_at, closed_at, version
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(till.id.to_string())
    .bind(till.operator_id.as_str())
    .bind(till.opening_balance.to_canonical_string())
    .bind(till.current_balance.to_canonical_string())
    .bind(till.state.as_str())
    .bind(till.opened_at.to_rfc3339())
    .bind(till.closed_at.map(|t| t.to_rfc3339()))
    .bind(till.version)
    .execute(executor)
    .await?;
    Ok(())
}

/// Versioned update. Returns the number of rows touched (0 when stale).
pub(super) async fn update_till<'e, E>(executor: E, till: &Till) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE tills SET
            current_balance = ?,
            state = ?,
            closed_at = ?,
            version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(till.current_balance.to_canonical_string())
    .bind(till.state.as_str())
    .bind(till.closed_at.map(|t| t.to_rfc3339()))
    .bind(till.id.to_string())
    .bind(till.version)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub(super) async fn insert_movement<'e, E>(executor: E, movement: &Movement) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO till_movements (
            id, till_id, direction, amount, balance_before, balance_after, reason, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(movement.id.to_string())
    .bind(movement.till_id.to_string())
    .bind(movement.direction.as_str())
    .bind(movement.amount.to_canonical_string())
    .bind(movement.balance_before.to_canonical_string())
    .bind(movement.balance_after.to_canonical_string())
    .bind(&movement.reason)
    .bind(movement.created_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub(super) async fn fetch_movements<'e, E>(
    executor: E,
    till_id: TillId,
) -> Result<Vec<Movement>, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, till_id, direction, amount, balance_before, balance_after, reason, created_at
        FROM till_movements
        WHERE till_id = ?
        ORDER BY seq ASC
        "#,
    )
    .bind(till_id.to_string())
    .fetch_all(executor)
    .await?;
    rows.iter().map(movement_from_row).collect()
}

pub(super) async fn insert_reconciliation<'e, E>(
    executor: E,
    reconciliation: &Reconciliation,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO reconciliations (
            till_id, physical_count, system_balance, variance, outcome, notes, closed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(reconciliation.till_id.to_string())
    .bind(reconciliation.physical_count.to_canonical_string())
    .bind(reconciliation.system_balance.to_canonical_string())
    .bind(reconciliation.variance.to_canonical_string())
    .bind(reconciliation.outcome.as_str())
    .bind(reconciliation.notes.as_deref())
    .bind(reconciliation.closed_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub(super) async fn fetch_reconciliation<'e, E>(
    executor: E,
    till_id: TillId,
) -> Result<Option<Reconciliation>, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT till_id, physical_count, system_balance, variance, outcome, notes, closed_at
        FROM reconciliations
        WHERE till_id = ?
        "#,
    )
    .bind(till_id.to_string())
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(reconciliation_from_row).transpose()
}
