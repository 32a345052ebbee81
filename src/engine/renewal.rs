//! Renewal protocol: apply a cashier payment to a loan.
//!
//! `apply` is pure. It validates the request against the current loan, till,
//! and collateral, and returns every record that must be committed together.

use crate::domain::{
    Collateral, CollateralState, Direction, LoanId, Loan, LoanState, Money, Movement, Payment,
    PaymentId, RenewalMode, Till, TillId,
};
use crate::engine::loan_ledger::{self, LedgerPolicy};
use crate::engine::till;
use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A cashier's request to apply a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalRequest {
    pub loan_id: LoanId,
    pub mode: RenewalMode,
    pub amount_paid: Money,
    pub till_id: Option<TillId>,
    pub as_of: NaiveDate,
    pub idempotency_key: Option<String>,
}

/// Everything a successful renewal changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalOutcome {
    pub loan: Loan,
    pub payment: Payment,
    /// Set when the loan was cancelled and its collateral handed back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_collateral: Option<Collateral>,
    #[serde(skip)]
    pub till: Option<Till>,
    /// Carries the till's running balance, so it never leaves the process as is.
    #[serde(skip)]
    pub movement: Option<Movement>,
    pub interest_charged: Money,
    pub penalty_charged: Money,
    pub principal_reduction: Money,
    /// Amount paid beyond what the mode required to settle the loan.
    pub excess: Money,
}

/// Amounts are compared at cent precision, so paying the displayed quote or
/// the exact accrual both succeed.
fn covers(paid: Money, due: Money) -> bool {
    paid.round_cents() >= due.round_cents()
}

fn require_covers(paid: Money, due: Money) -> Result<(), CoreError> {
    if covers(paid, due) {
        Ok(())
    } else {
        Err(CoreError::InsufficientAmount {
            required: due.to_string(),
            paid: paid.to_string(),
        })
    }
}

struct LoanChange {
    loan: Loan,
    interest: Money,
    penalty: Money,
    reduction: Money,
    excess: Money,
}

fn roll_over(loan: &Loan, as_of: NaiveDate, outstanding: Money) -> Result<Loan, CoreError> {
    let state = if outstanding.is_zero() {
        LoanState::Cancelled
    } else {
        LoanState::Active
    };
    Ok(Loan {
        outstanding_principal: outstanding,
        due_at: loan_ledger::advance_days(loan.due_at, loan.period_days)?,
        accrual_start: as_of,
        state,
        ..loan.clone()
    })
}

fn apply_mode(
    loan: &Loan,
    request: &RenewalRequest,
    policy: &LedgerPolicy,
) -> Result<LoanChange, CoreError> {
    let paid = request.amount_paid;
    let interest = loan_ledger::accrued_interest(loan, request.as_of)?.round_cents();

    match request.mode {
        RenewalMode::InterestOnly => {
            require_covers(paid, interest)?;
            // The capital resets to the original principal on every interest-only renewal.
            let next = roll_over(loan, request.as_of, loan.principal)?;
            Ok(LoanChange {
                loan: next,
                interest,
                penalty: Money::ZERO,
                reduction: Money::ZERO,
                excess: (paid - interest).floor_zero(),
            })
        }
        RenewalMode::FullPayoff => {
            let quote = loan_ledger::payoff_quote(loan, request.as_of, policy)?;
            require_covers(paid, quote.total)?;
            let next = Loan {
                outstanding_principal: Money::ZERO,
                state: LoanState::Cancelled,
                ..loan.clone()
            };
            Ok(LoanChange {
                loan: next,
                interest: quote.interest,
                penalty: quote.penalty,
                reduction: loan.outstanding_principal,
                excess: (paid - quote.total).floor_zero(),
            })
        }
        RenewalMode::PartialPrincipal => {
            require_covers(paid, interest)?;
            let toward_principal = (paid - interest).floor_zero();
            let outstanding = (loan.outstanding_principal - toward_principal).floor_zero();
            let reduction = loan.outstanding_principal - outstanding;
            let next = roll_over(loan, request.as_of, outstanding)?;
            Ok(LoanChange {
                loan: next,
                interest,
                penalty: Money::ZERO,
                reduction,
                excess: toward_principal - reduction,
            })
        }
    }
}

/// The payment date must fall inside the current interest period and not
/// after the moment the payment is registered.
fn check_as_of(loan: &Loan, as_of: NaiveDate, registered_at: DateTime<Utc>) -> Result<(), CoreError> {
    if as_of < loan.accrual_start {
        return Err(CoreError::InvalidConfiguration(format!(
            "payment date {} is before the current interest period started on {}",
            as_of, loan.accrual_start
        )));
    }
    let today = registered_at.date_naive();
    if as_of > today {
        return Err(CoreError::InvalidConfiguration(format!(
            "payment date {} is after {}",
            as_of, today
        )));
    }
    Ok(())
}

/// Validate and compute a renewal.
///
/// `till` must be the till named by `request.till_id` (or `None` if it does
/// not exist). Nothing is persisted here.
pub fn apply(
    loan: &Loan,
    collateral: &Collateral,
    till: Option<&Till>,
    request: &RenewalRequest,
    policy: &LedgerPolicy,
    registered_at: DateTime<Utc>,
) -> Result<RenewalOutcome, CoreError> {
    if !request.amount_paid.is_positive() {
        return Err(CoreError::InvalidAmount(format!(
            "amount paid {} must be positive",
            request.amount_paid
        )));
    }
    till::require_whole_cents(request.amount_paid, "amount paid")?;
    if !loan.is_active() {
        return Err(CoreError::LoanNotActive(loan.id.to_string()));
    }
    check_as_of(loan, request.as_of, registered_at)?;
    let open_till = match request.till_id {
        Some(till_id) => match till {
            Some(t) if t.id == till_id && t.is_open() => Some(t),
            _ => return Err(CoreError::TillNotOpen(till_id.to_string())),
        },
        None => None,
    };

    let change = apply_mode(loan, request, policy)?;

    let released_collateral = if change.loan.state == LoanState::Cancelled
        && collateral.state == CollateralState::InCustody
    {
        Some(collateral.released())
    } else {
        None
    };

    let (till, movement) = match open_till {
        Some(t) => {
            let reason = format!("{} payment for loan {}", request.mode, loan.id);
            let (next, movement) =
                till::record_movement(t, Direction::In, request.amount_paid, reason, registered_at)?;
            (Some(next), Some(movement))
        }
        None => (None, None),
    };

    let payment = Payment {
        id: PaymentId::new(),
        loan_id: loan.id,
        amount: request.amount_paid,
        kind: request.mode,
        registered_at,
        till_id: till.as_ref().map(|t| t.id),
        idempotency_key: request.idempotency_key.clone(),
    };

    Ok(RenewalOutcome {
        loan: change.loan,
        payment,
        released_collateral,
        till,
        movement,
        interest_charged: change.interest,
        penalty_charged: change.penalty,
        principal_reduction: change.reduction,
        excess: change.excess,
    })
}
