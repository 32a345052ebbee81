//! Loan, collateral, and payment queries.

use crate::domain::{Collateral, CollateralId, Loan, LoanId, Payment};
use crate::error::CoreError;
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Executor, Row};

use super::{parse_col, parse_opt_col};

const LOAN_COLUMNS: &str = "id, collateral_id, principal, monthly_rate_percent, disbursed_at, \
     accrual_start, due_at, period_days, outstanding_principal, state, version";

fn loan_from_row(row: &SqliteRow) -> Result<Loan, CoreError> {
    let period_days: i64 = row.try_get("period_days")?;
    let period_days = u32::try_from(period_days)
        .map_err(|_| CoreError::CorruptRecord(format!("period_days = {}", period_days)))?;

    Ok(Loan {
        id: parse_col(row, "id")?,
        collateral_id: parse_col(row, "collateral_id")?,
        principal: parse_col(row, "principal")?,
        monthly_rate_percent: parse_col(row, "monthly_rate_percent")?,
        disbursed_at: parse_col(row, "disbursed_at")?,
        accrual_start: parse_col(row, "accrual_start")?,
        due_at: parse_col(row, "due_at")?,
        period_days,
        outstanding_principal: parse_col(row, "outstanding_principal")?,
        state: parse_col(row, "state")?,
        version: row.try_get("version")?,
    })
}

fn collateral_from_row(row: &SqliteRow) -> Result<Collateral, CoreError> {
    Ok(Collateral {
        id: parse_col(row, "id")?,
        loan_id: parse_opt_col(row, "loan_id")?,
        description: row.try_get("description")?,
        appraised_value: parse_col(row, "appraised_value")?,
        state: parse_col(row, "state")?,
    })
}

fn payment_from_row(row: &SqliteRow) -> Result<Payment, CoreError> {
    Ok(Payment {
        id: parse_col(row, "id")?,
        loan_id: parse_col(row, "loan_id")?,
        amount: parse_col(row, "amount")?,
        kind: parse_col(row, "kind")?,
        registered_at: parse_col(row, "registered_at")?,
        till_id: parse_opt_col(row, "till_id")?,
        idempotency_key: row.try_get("idempotency_key")?,
    })
}

pub(super) async fn fetch_loan<'e, E>(executor: E, id: LoanId) -> Result<Option<Loan>, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM loans WHERE id = ?", LOAN_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(loan_from_row).transpose()
}

pub(super) async fn insert_loan<'e, E>(executor: E, loan: &Loan) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO loans (
            id, collateral_id, principal, monthly_rate_percent, disbursed_at,
            accrual_start, due_at, period_days, outstanding_principal, state, version
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(loan.id.to_string())
    .bind(loan.collateral_id.to_string())
    .bind(loan.principal.to_canonical_string())
    .bind(loan.monthly_rate_percent.to_string())
    .bind(loan.disbursed_at.to_string())
    .bind(loan.accrual_start.to_string())
    .bind(loan.due_at.to_string())
    .bind(i64::from(loan.period_days))
    .bind(loan.outstanding_principal.to_canonical_string())
    .bind(loan.state.as_str())
    .bind(loan.version)
    .execute(executor)
    .await?;
    Ok(())
}

/// Versioned update. Returns the number of rows touched (0 when stale).
pub(super) async fn update_loan<'e, E>(executor: E, loan: &Loan) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE loans SET
            accrual_start = ?,
            due_at = ?,
            outstanding_principal = ?,
            state = ?,
            version = version + 1
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(loan.accrual_start.to_string())
    .bind(loan.due_at.to_string())
    .bind(loan.outstanding_principal.to_canonical_string())
    .bind(loan.state.as_str())
    .bind(loan.id.to_string())
    .bind(loan.version)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub(super) async fn fetch_collateral<'e, E>(
    executor: E,
    id: CollateralId,
) -> Result<Option<Collateral>, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, loan_id, description, appraised_value, state FROM collaterals WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(collateral_from_row).transpose()
}

pub(super) async fn fetch_collateral_for_loan<'e, E>(
    executor: E,
    loan_id: LoanId,
) -> Result<Option<Collateral>, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT c.id, c.loan_id, c.description, c.appraised_value, c.state
        FROM collaterals c
        JOIN loans l ON l.collateral_id = c.id
        WHERE l.id = ?
        "#,
    )
    .bind(loan_id.to_string())
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(collateral_from_row).transpose()
}

pub(super) async fn upsert_collateral<'e, E>(
    executor: E,
    collateral: &Collateral,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO collaterals (id, loan_id, description, appraised_value, state)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            loan_id = excluded.loan_id,
            description = excluded.description,
            appraised_value = excluded.appraised_value,
            state = excluded.state
        "#,
    )
    .bind(collateral.id.to_string())
    .bind(collateral.loan_id.map(|id| id.to_string()))
    .bind(&collateral.description)
    .bind(collateral.appraised_value.to_canonical_string())
    .bind(collateral.state.as_str())
    .execute(executor)
    .await?;
    Ok(())
}

pub(super) async fn insert_payment<'e, E>(executor: E, payment: &Payment) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO payments (id, loan_id, amount, kind, registered_at, till_id, idempotency_key)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payment.id.to_string())
    .bind(payment.loan_id.to_string())
    .bind(payment.amount.to_canonical_string())
    .bind(payment.kind.as_str())
    .bind(payment.registered_at.to_rfc3339())
    .bind(payment.till_id.map(|id| id.to_string()))
    .bind(payment.idempotency_key.as_deref())
    .execute(executor)
    .await?;
    Ok(())
}

pub(super) async fn payment_key_exists<'e, E>(
    executor: E,
    loan_id: LoanId,
    key: &str,
) -> Result<bool, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payments WHERE loan_id = ? AND idempotency_key = ?",
    )
    .bind(loan_id.to_string())
    .bind(key)
    .fetch_one(executor)
    .await?;
    Ok(count > 0)
}

pub(super) async fn fetch_payments<'e, E>(
    executor: E,
    loan_id: LoanId,
) -> Result<Vec<Payment>, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, loan_id, amount, kind, registered_at, till_id, idempotency_key
        FROM payments
        WHERE loan_id = ?
        ORDER BY seq ASC
        "#,
    )
    .bind(loan_id.to_string())
    .fetch_all(executor)
    .await?;
    rows.iter().map(payment_from_row).collect()
}
