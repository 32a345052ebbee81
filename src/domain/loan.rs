//! Loans (credits) and the collateral that secures them.

use crate::domain::{CollateralId, LoanId, Money, Percent};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stored lifecycle state of a loan. `Active -> Cancelled` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanState {
    Active,
    Cancelled,
}

impl LoanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Active => "active",
            LoanState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanState::Active),
            "cancelled" => Ok(LoanState::Cancelled),
            other => Err(format!("unknown loan state: {}", other)),
        }
    }
}

/// Status label shown to operators. Derived from dates, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Current,
    AtRisk,
    PastDue,
    Cancelled,
}

/// A loan disbursed against pledged collateral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: LoanId,
    pub collateral_id: CollateralId,
    /// Original disbursed capital. Interest and mora are computed on this.
    pub principal: Money,
    pub monthly_rate_percent: Percent,
    pub disbursed_at: NaiveDate,
    /// Start of the current interest period. Moves forward on renewal.
    pub accrual_start: NaiveDate,
    pub due_at: NaiveDate,
    pub period_days: u32,
    pub outstanding_principal: Money,
    pub state: LoanState,
    /// Optimistic concurrency counter, bumped on every save.
    #[serde(skip)]
    pub version: i64,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.state == LoanState::Active
    }
}

/// Custody state of a collateral item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralState {
    InCustody,
    Released,
}

impl CollateralState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollateralState::InCustody => "in_custody",
            CollateralState::Released => "released",
        }
    }
}

impl FromStr for CollateralState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_custody" => Ok(CollateralState::InCustody),
            "released" => Ok(CollateralState::Released),
            other => Err(format!("unknown collateral state: {}", other)),
        }
    }
}

/// A pledged physical item (garantía).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collateral {
    pub id: CollateralId,
    pub loan_id: Option<LoanId>,
    pub description: String,
    pub appraised_value: Money,
    pub state: CollateralState,
}

impl Collateral {
    /// Hand the item back to its owner.
    pub fn released(&self) -> Collateral {
        Collateral {
            state: CollateralState::Released,
            ..self.clone()
        }
    }
}
