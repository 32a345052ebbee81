//! Tiered profit distribution between investors and the operating company.
//!
//! Tiers run strictly in order, each consuming from what the previous tiers
//! left: return of capital, preferred return (hurdle), manager catch-up, and
//! the final carried-interest split.

use crate::domain::{Money, Percent};
use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Inputs to a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterfallInput {
    pub capital_contributed: Money,
    /// Total amount available for distribution.
    pub total_profit: Money,
    pub hurdle_rate_percent: Percent,
    pub carried_interest_percent: Percent,
}

/// Final tier split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrySplit {
    pub investor_share: Money,
    pub manager_share: Money,
}

/// Per-tier amounts and stakeholder totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterfallResult {
    /// Tier 1, to investors.
    pub return_of_capital: Money,
    /// Tier 2, to investors.
    pub preferred_return: Money,
    /// Tier 3, to the manager.
    pub catch_up: Money,
    /// Tier 4.
    pub carried_interest: CarrySplit,
    pub investor_total: Money,
    pub manager_total: Money,
}

fn validate(input: &WaterfallInput) -> Result<(), CoreError> {
    if input.capital_contributed.is_negative() {
        return Err(CoreError::InvalidConfiguration(
            "capital contributed cannot be negative".into(),
        ));
    }
    if input.hurdle_rate_percent.is_negative() {
        return Err(CoreError::InvalidConfiguration(
            "hurdle rate cannot be negative".into(),
        ));
    }
    let carry = input.carried_interest_percent;
    if carry.is_negative() || carry > Percent::HUNDRED {
        return Err(CoreError::InvalidConfiguration(format!(
            "carried interest must be between 0 and 100, got {}",
            carry
        )));
    }
    Ok(())
}

/// Manager amount that makes `manager / (preferred + manager) == carry`.
fn catch_up_target(preferred: Money, carry: Percent, remaining: Money) -> Result<Money, CoreError> {
    if carry.is_negative() || carry.value().is_zero() {
        return Ok(Money::ZERO);
    }
    if carry == Percent::HUNDRED {
        return Ok(remaining);
    }
    let target = preferred
        .checked_scale(carry.value())?
        .checked_div(carry.complement().value())?;
    Ok(target.round_cents())
}

/// Split `total_profit` across the four tiers.
///
/// # Errors
/// Returns `InvalidConfiguration` for negative capital or rates, or a carry
/// above 100%, and `InvalidAmount` when a tier overflows the decimal range.
pub fn distribute(input: &WaterfallInput) -> Result<WaterfallResult, CoreError> {
    validate(input)?;

    if !input.total_profit.is_positive() {
        return Ok(WaterfallResult::default());
    }

    let mut remaining = input.total_profit;

    let return_of_capital = input.capital_contributed.min(remaining);
    remaining -= return_of_capital;

    let hurdle = input
        .capital_contributed
        .checked_scale(input.hurdle_rate_percent.as_fraction())?
        .round_cents();
    let preferred_return = hurdle.min(remaining);
    remaining -= preferred_return;

    let catch_up = catch_up_target(preferred_return, input.carried_interest_percent, remaining)?
        .min(remaining);
    remaining -= catch_up;

    // The investor share absorbs the rounding residue so totals stay exact.
    let manager_share = remaining
        .checked_scale(input.carried_interest_percent.as_fraction())?
        .round_cents()
        .min(remaining);
    let carried_interest = CarrySplit {
        investor_share: remaining - manager_share,
        manager_share,
    };

    let result = WaterfallResult {
        return_of_capital,
        preferred_return,
        catch_up,
        carried_interest,
        investor_total: return_of_capital + preferred_return + carried_interest.investor_share,
        manager_total: catch_up + carried_interest.manager_share,
    };

    tracing::debug!(
        total_profit = %input.total_profit,
        investor_total = %result.investor_total,
        manager_total = %result.manager_total,
        "waterfall distributed"
    );

    Ok(result)
}
