//! Payments registered against a loan.

use crate::domain::{LoanId, Money, PaymentId, TillId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a payment is applied to a loan. Also the kind recorded on the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalMode {
    /// Pay the accrued interest and roll the loan over for another period.
    InterestOnly,
    /// Pay everything owed and cancel the loan.
    FullPayoff,
    /// Pay the interest plus part of the principal, then roll over.
    PartialPrincipal,
}

impl RenewalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalMode::InterestOnly => "interest_only",
            RenewalMode::FullPayoff => "full_payoff",
            RenewalMode::PartialPrincipal => "partial_principal",
        }
    }
}

impl fmt::Display for RenewalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenewalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interest_only" => Ok(RenewalMode::InterestOnly),
            "full_payoff" => Ok(RenewalMode::FullPayoff),
            "partial_principal" => Ok(RenewalMode::PartialPrincipal),
            other => Err(format!("unknown renewal mode: {}", other)),
        }
    }
}

/// An immutable payment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub amount: Money,
    pub kind: RenewalMode,
    pub registered_at: DateTime<Utc>,
    /// Till that received the cash, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub till_id: Option<TillId>,
    /// Client-supplied key used to reject resubmissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_roundtrip() {
        for mode in [
            RenewalMode::InterestOnly,
            RenewalMode::FullPayoff,
            RenewalMode::PartialPrincipal,
        ] {
            assert_eq!(mode.as_str().parse::<RenewalMode>().unwrap(), mode);
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!("refinance".parse::<RenewalMode>().is_err());
        assert!(serde_json::from_str::<RenewalMode>("\"refinance\"").is_err());
    }
}
