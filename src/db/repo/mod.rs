//! Repository layer for database operations.
//!
//! `Repository` serves pooled reads. Every mutation goes through a `LedgerTx`
//! obtained from `begin_write`, which holds the process-wide write gate and a
//! SQLite transaction. Dropping a `LedgerTx` without `commit` rolls back every
//! statement issued through it.
//!
//! Queries are organized across submodules by domain:
//! - `loans.rs` - Loans, collateral, and payments
//! - `tills.rs` - Tills, movements, and reconciliations

mod loans;
mod tills;

use crate::domain::{
    Collateral, CollateralId, Loan, LoanId, Movement, OperatorId, Payment, Reconciliation, Till,
    TillId,
};
use crate::error::CoreError;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Row, Transaction};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

/// Read a TEXT column and parse it, failing loudly on corrupt data.
fn parse_col<T>(row: &SqliteRow, column: &str) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| {
        warn!(column = column, value = %raw, error = %e, "Failed to parse stored column");
        CoreError::CorruptRecord(format!("{} = {:?}: {}", column, raw, e))
    })
}

/// Like `parse_col` for nullable columns.
fn parse_opt_col<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, CoreError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| {
        value.parse::<T>().map_err(|e| {
            warn!(column = column, value = %value, error = %e, "Failed to parse stored column");
            CoreError::CorruptRecord(format!("{} = {:?}: {}", column, value, e))
        })
    })
    .transpose()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Repository for database operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Start a serialized write transaction.
    ///
    /// Waits until every earlier write transaction has committed or rolled
    /// back, so reads inside the returned transaction see the latest state.
    pub async fn begin_write(&self) -> Result<LedgerTx, CoreError> {
        let gate = self.write_gate.clone().lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(LedgerTx { tx, _gate: gate })
    }

    /// Round-trip a trivial query to check the database is reachable.
    pub async fn ping(&self) -> Result<(), CoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Loan reads
    // =========================================================================

    /// # Errors
    /// Returns `NotFound` if no loan has this id.
    pub async fn get_loan(&self, id: LoanId) -> Result<Loan, CoreError> {
        loans::fetch_loan(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("loan {}", id)))
    }

    /// Collateral securing a loan.
    pub async fn get_collateral(&self, loan_id: LoanId) -> Result<Collateral, CoreError> {
        loans::fetch_collateral_for_loan(&self.pool, loan_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("collateral for loan {}", loan_id)))
    }

    /// Payments for a loan in registration order.
    pub async fn list_payments(&self, loan_id: LoanId) -> Result<Vec<Payment>, CoreError> {
        loans::fetch_payments(&self.pool, loan_id).await
    }

    // =========================================================================
    // Till reads
    // =========================================================================

    /// # Errors
    /// Returns `NotFound` if no till has this id.
    pub async fn get_till(&self, id: TillId) -> Result<Till, CoreError> {
        tills::fetch_till(&self.pool, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("till {}", id)))
    }

    pub async fn find_open_till(&self, operator_id: &OperatorId) -> Result<Option<Till>, CoreError> {
        tills::fetch_open_till(&self.pool, operator_id).await
    }

    /// Movements for a till in append order.
    pub async fn list_movements(&self, till_id: TillId) -> Result<Vec<Movement>, CoreError> {
        tills::fetch_movements(&self.pool, till_id).await
    }

    pub async fn get_reconciliation(
        &self,
        till_id: TillId,
    ) -> Result<Option<Reconciliation>, CoreError> {
        tills::fetch_reconciliation(&self.pool, till_id).await
    }
}

/// A serialized write transaction implementing the ledger's persistence
/// operations. Nothing is visible to other connections until `commit`.
pub struct LedgerTx {
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl LedgerTx {
    pub async fn commit(self) -> Result<(), CoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), CoreError> {
        self.tx.rollback().await?;
        Ok(())
    }

    // =========================================================================
    // Loans and collateral
    // =========================================================================

    pub async fn get_loan(&mut self, id: LoanId) -> Result<Loan, CoreError> {
        loans::fetch_loan(&mut *self.tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("loan {}", id)))
    }

    /// Insert a newly disbursed loan.
    ///
    /// # Errors
    /// Returns `CollateralInUse` if the collateral already backs an active loan.
    pub async fn insert_loan(&mut self, loan: &Loan) -> Result<(), CoreError> {
        loans::insert_loan(&mut *self.tx, loan).await.map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::CollateralInUse(loan.collateral_id.to_string())
            } else {
                CoreError::Storage(e)
            }
        })
    }

    /// Persist a loan mutation, returning the new version.
    ///
    /// # Errors
    /// Returns `ConcurrentModification` if the stored version moved since read.
    pub async fn save_loan(&mut self, loan: &Loan) -> Result<i64, CoreError> {
        let updated = loans::update_loan(&mut *self.tx, loan).await?;
        if updated == 0 {
            return Err(CoreError::ConcurrentModification(format!("loan {}", loan.id)));
        }
        Ok(loan.version + 1)
    }

    pub async fn get_collateral(&mut self, loan_id: LoanId) -> Result<Collateral, CoreError> {
        loans::fetch_collateral_for_loan(&mut *self.tx, loan_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("collateral for loan {}", loan_id)))
    }

    pub async fn get_collateral_by_id(
        &mut self,
        id: CollateralId,
    ) -> Result<Option<Collateral>, CoreError> {
        loans::fetch_collateral(&mut *self.tx, id).await
    }

    /// Insert or update a collateral record.
    pub async fn save_collateral(&mut self, collateral: &Collateral) -> Result<(), CoreError> {
        loans::upsert_collateral(&mut *self.tx, collateral).await?;
        Ok(())
    }

    /// # Errors
    /// Returns `DuplicatePayment` if the idempotency key was already used for this loan.
    pub async fn append_payment(&mut self, payment: &Payment) -> Result<(), CoreError> {
        loans::insert_payment(&mut *self.tx, payment).await.map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::DuplicatePayment(payment.idempotency_key.clone().unwrap_or_default())
            } else {
                CoreError::Storage(e)
            }
        })
    }

    pub async fn payment_key_exists(&mut self, loan_id: LoanId, key: &str) -> Result<bool, CoreError> {
        loans::payment_key_exists(&mut *self.tx, loan_id, key).await
    }

    // =========================================================================
    // Tills
    // =========================================================================

    pub async fn get_till(&mut self, id: TillId) -> Result<Option<Till>, CoreError> {
        tills::fetch_till(&mut *self.tx, id).await
    }

    pub async fn find_open_till(&mut self, operator_id: &OperatorId) -> Result<Option<Till>, CoreError> {
        tills::fetch_open_till(&mut *self.tx, operator_id).await
    }

    /// # Errors
    /// Returns `TillAlreadyOpen` if the operator already has an open till.
    pub async fn insert_till(&mut self, till: &Till) -> Result<(), CoreError> {
        tills::insert_till(&mut *self.tx, till).await.map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::TillAlreadyOpen(till.operator_id.to_string())
            } else {
                CoreError::Storage(e)
            }
        })
    }

    /// Persist a till mutation, returning the new version.
    pub async fn save_till(&mut self, till: &Till) -> Result<i64, CoreError> {
        let updated = tills::update_till(&mut *self.tx, till).await?;
        if updated == 0 {
            return Err(CoreError::ConcurrentModification(format!("till {}", till.id)));
        }
        Ok(till.version + 1)
    }

    pub async fn append_movement(&mut self, movement: &Movement) -> Result<(), CoreError> {
        tills::insert_movement(&mut *self.tx, movement).await?;
        Ok(())
    }

    pub async fn save_reconciliation(
        &mut self,
        reconciliation: &Reconciliation,
    ) -> Result<(), CoreError> {
        tills::insert_reconciliation(&mut *self.tx, reconciliation).await?;
        Ok(())
    }
}
