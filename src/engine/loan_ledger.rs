//! Interest, mora, and payoff computations for a single loan.
//!
//! All functions take an explicit `as_of` date; nothing here reads a clock.

use crate::domain::{DisplayStatus, Loan, Money, Percent};
use crate::error::CoreError;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Interest periods are prorated over a 30-day commercial month.
pub const DAYS_PER_MONTH: NonZeroU32 = match NonZeroU32::new(30) {
    Some(days) => days,
    None => panic!("days per month must be non-zero"),
};

/// Shop-wide parameters applied when quoting loans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// Daily mora rate charged on the principal after the due date.
    pub daily_penalty_rate_percent: Percent,
    /// Days before `due_at` at which a loan is labelled at risk.
    pub at_risk_window_days: u32,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            daily_penalty_rate_percent: Percent::ZERO,
            at_risk_window_days: 3,
        }
    }
}

/// Everything owed on a loan at a given date, rounded to cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoffQuote {
    pub as_of: NaiveDate,
    /// Outstanding principal.
    pub principal: Money,
    pub interest: Money,
    pub penalty: Money,
    pub total: Money,
    pub days_elapsed: i64,
    pub days_past_due: i64,
}

/// Calendar days from `from` to `to`, floored at zero.
pub fn days_elapsed(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days().max(0)
}

/// Simple pro-rata interest for the current period.
///
/// `principal * rate/100 * days/30`, measured from the start of the current
/// interest period. Partial principal payments do not reduce it.
///
/// # Errors
/// Returns `InvalidAmount` when the terms overflow the decimal range.
pub fn accrued_interest(loan: &Loan, as_of: NaiveDate) -> Result<Money, CoreError> {
    let days = days_elapsed(loan.accrual_start, as_of);
    Ok(loan
        .principal
        .checked_scale(loan.monthly_rate_percent.as_fraction())?
        .checked_prorate(days, DAYS_PER_MONTH)?)
}

/// Days past the due date, floored at zero.
pub fn days_past_due(loan: &Loan, as_of: NaiveDate) -> i64 {
    days_elapsed(loan.due_at, as_of)
}

/// Mora: `principal * daily_rate/100 * days_past_due`.
pub fn penalty_interest(
    loan: &Loan,
    as_of: NaiveDate,
    daily_penalty_rate_percent: Percent,
) -> Result<Money, CoreError> {
    let days = days_past_due(loan, as_of);
    Ok(loan
        .principal
        .checked_scale(daily_penalty_rate_percent.as_fraction())?
        .checked_scale(days.into())?)
}

/// Quote the full payoff amount. A cancelled loan owes nothing.
pub fn payoff_quote(
    loan: &Loan,
    as_of: NaiveDate,
    policy: &LedgerPolicy,
) -> Result<PayoffQuote, CoreError> {
    if !loan.is_active() {
        return Ok(PayoffQuote {
            as_of,
            principal: Money::ZERO,
            interest: Money::ZERO,
            penalty: Money::ZERO,
            total: Money::ZERO,
            days_elapsed: 0,
            days_past_due: 0,
        });
    }

    let principal = loan.outstanding_principal.round_cents();
    let interest = accrued_interest(loan, as_of)?.round_cents();
    let penalty = penalty_interest(loan, as_of, policy.daily_penalty_rate_percent)?.round_cents();

    Ok(PayoffQuote {
        as_of,
        principal,
        interest,
        penalty,
        total: principal.checked_add(interest)?.checked_add(penalty)?,
        days_elapsed: days_elapsed(loan.accrual_start, as_of),
        days_past_due: days_past_due(loan, as_of),
    })
}

/// Operator-facing urgency label.
pub fn display_status(loan: &Loan, as_of: NaiveDate, at_risk_window_days: u32) -> DisplayStatus {
    if !loan.is_active() {
        return DisplayStatus::Cancelled;
    }
    let days_left = (loan.due_at - as_of).num_days();
    if days_left < 0 {
        DisplayStatus::PastDue
    } else if days_left <= i64::from(at_risk_window_days) {
        DisplayStatus::AtRisk
    } else {
        DisplayStatus::Current
    }
}

/// Move a date forward by a whole number of days.
///
/// # Errors
/// Returns `InvalidConfiguration` if the result is outside the calendar range.
pub fn advance_days(date: NaiveDate, days: u32) -> Result<NaiveDate, CoreError> {
    date.checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| CoreError::InvalidConfiguration(format!("{} + {} days overflows", date, days)))
}
