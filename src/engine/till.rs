//! Cash drawer rules: opening, movements, and the blind-count close.
//!
//! Each function returns the next till state plus the record to append; the
//! caller persists both atomically.

use crate::domain::{
    Direction, Money, Movement, MovementId, OperatorId, Reconciliation, ReconciliationOutcome,
    Till, TillId, TillState,
};
use crate::error::CoreError;
use chrono::{DateTime, Utc};

/// Reject amounts that carry a fraction of a cent. Cash changes hands in
/// whole cents, and every view renders two decimals.
pub fn require_whole_cents(amount: Money, what: &str) -> Result<(), CoreError> {
    if amount.is_whole_cents() {
        Ok(())
    } else {
        Err(CoreError::InvalidAmount(format!(
            "{} {} has a fraction of a cent",
            what,
            amount.to_canonical_string()
        )))
    }
}

/// Open a new till for `operator_id`.
///
/// `existing_open` is the operator's currently open till, if any.
pub fn open_till(
    operator_id: OperatorId,
    opening_balance: Money,
    existing_open: Option<&Till>,
    opened_at: DateTime<Utc>,
) -> Result<Till, CoreError> {
    if existing_open.is_some_and(Till::is_open) {
        return Err(CoreError::TillAlreadyOpen(operator_id.to_string()));
    }
    if opening_balance.is_negative() {
        return Err(CoreError::InvalidAmount(format!(
            "opening balance {} is negative",
            opening_balance
        )));
    }
    require_whole_cents(opening_balance, "opening balance")?;

    Ok(Till {
        id: TillId::new(),
        operator_id,
        opening_balance,
        current_balance: opening_balance,
        state: TillState::Open,
        opened_at,
        closed_at: None,
        version: 0,
    })
}

/// Apply one cash movement to an open till.
pub fn record_movement(
    till: &Till,
    direction: Direction,
    amount: Money,
    reason: impl Into<String>,
    created_at: DateTime<Utc>,
) -> Result<(Till, Movement), CoreError> {
    if !till.is_open() {
        return Err(CoreError::TillNotOpen(till.id.to_string()));
    }
    if !amount.is_positive() {
        return Err(CoreError::InvalidAmount(format!(
            "movement amount {} must be positive",
            amount
        )));
    }
    require_whole_cents(amount, "movement amount")?;

    let balance_before = till.current_balance;
    let balance_after = match direction {
        Direction::In => balance_before.checked_add(amount)?,
        Direction::Out => balance_before - amount,
    };
    if balance_after.is_negative() {
        return Err(CoreError::InsufficientFunds {
            till: till.id.to_string(),
            requested: amount.to_string(),
        });
    }

    let movement = Movement {
        id: MovementId::new(),
        till_id: till.id,
        direction,
        amount,
        balance_before,
        balance_after,
        reason: reason.into(),
        created_at,
    };
    let next = Till {
        current_balance: balance_after,
        ..till.clone()
    };
    Ok((next, movement))
}

/// Blind close: compare the operator's physical count with the system balance.
///
/// The variance is reported only; no corrective movement is generated.
pub fn close_till(
    till: &Till,
    physical_count: Money,
    notes: Option<String>,
    closed_at: DateTime<Utc>,
) -> Result<(Till, Reconciliation), CoreError> {
    if !till.is_open() {
        return Err(CoreError::TillNotOpen(till.id.to_string()));
    }
    if physical_count.is_negative() {
        return Err(CoreError::InvalidAmount(format!(
            "physical count {} is negative",
            physical_count
        )));
    }
    require_whole_cents(physical_count, "physical count")?;

    let variance = physical_count - till.current_balance;
    let reconciliation = Reconciliation {
        till_id: till.id,
        physical_count,
        system_balance: till.current_balance,
        variance,
        outcome: ReconciliationOutcome::from_variance(variance),
        notes: notes.filter(|n| !n.trim().is_empty()),
        closed_at,
    };
    let closed = Till {
        state: TillState::Closed,
        closed_at: Some(closed_at),
        ..till.clone()
    };
    Ok((closed, reconciliation))
}

/// Recompute a balance from the movement log: `opening + Σin - Σout`.
pub fn replay_balance<'a>(opening: Money, movements: impl IntoIterator<Item = &'a Movement>) -> Money {
    movements
        .into_iter()
        .fold(opening, |balance, mv| match mv.direction {
            Direction::In => balance + mv.amount,
            Direction::Out => balance - mv.amount,
        })
}

/// Check that a till's movement log chains and matches its stored balance.
pub fn audit_movements(till: &Till, movements: &[Movement]) -> Result<(), CoreError> {
    let mut expected = till.opening_balance;
    for mv in movements {
        let after = replay_balance(mv.balance_before, std::iter::once(mv));
        if mv.balance_before != expected || mv.balance_after != after {
            return Err(CoreError::CorruptRecord(format!(
                "movement {} does not chain from balance {}",
                mv.id, expected
            )));
        }
        expected = mv.balance_after;
    }
    if expected != till.current_balance {
        return Err(CoreError::CorruptRecord(format!(
            "till {} balance {} differs from movement log {}",
            till.id, till.current_balance, expected
        )));
    }
    Ok(())
}
