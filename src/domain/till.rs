//! Cash drawer (caja) sessions, their movements, and the closing reconciliation.

use crate::domain::{Money, MovementId, OperatorId, TillId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TillState {
    Open,
    Closed,
}

impl TillState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TillState::Open => "open",
            TillState::Closed => "closed",
        }
    }
}

impl FromStr for TillState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TillState::Open),
            "closed" => Ok(TillState::Closed),
            other => Err(format!("unknown till state: {}", other)),
        }
    }
}

/// A cash drawer session for one operator shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Till {
    pub id: TillId,
    pub operator_id: OperatorId,
    pub opening_balance: Money,
    pub current_balance: Money,
    pub state: TillState,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub version: i64,
}

impl Till {
    pub fn is_open(&self) -> bool {
        self.state == TillState::Open
    }
}

/// Cash flow direction relative to the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(format!("unknown movement direction: {}", other)),
        }
    }
}

/// Append-only record of one cash movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: MovementId,
    pub till_id: TillId,
    pub direction: Direction,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Classification of a closing variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    /// Physical count equals the system balance.
    Match,
    /// More cash than expected.
    Overage,
    /// Less cash than expected.
    Shortage,
}

impl ReconciliationOutcome {
    pub fn from_variance(variance: Money) -> Self {
        if variance.is_zero() {
            ReconciliationOutcome::Match
        } else if variance.is_positive() {
            ReconciliationOutcome::Overage
        } else {
            ReconciliationOutcome::Shortage
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationOutcome::Match => "match",
            ReconciliationOutcome::Overage => "overage",
            ReconciliationOutcome::Shortage => "shortage",
        }
    }
}

impl FromStr for ReconciliationOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match" => Ok(ReconciliationOutcome::Match),
            "overage" => Ok(ReconciliationOutcome::Overage),
            "shortage" => Ok(ReconciliationOutcome::Shortage),
            other => Err(format!("unknown reconciliation outcome: {}", other)),
        }
    }
}

/// Blind-count result produced once when a till closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub till_id: TillId,
    pub physical_count: Money,
    pub system_balance: Money,
    /// `physical_count - system_balance`.
    pub variance: Money,
    pub outcome: ReconciliationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub closed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_variance() {
        assert_eq!(
            ReconciliationOutcome::from_variance(Money::ZERO),
            ReconciliationOutcome::Match
        );
        assert_eq!(
            ReconciliationOutcome::from_variance(Money::from_cents(1)),
            ReconciliationOutcome::Overage
        );
        assert_eq!(
            ReconciliationOutcome::from_variance(Money::from_cents(-200)),
            ReconciliationOutcome::Shortage
        );
    }

    #[test]
    fn test_enum_string_roundtrips() {
        for d in [Direction::In, Direction::Out] {
            assert_eq!(d.as_str().parse::<Direction>().unwrap(), d);
        }
        for s in [TillState::Open, TillState::Closed] {
            assert_eq!(s.as_str().parse::<TillState>().unwrap(), s);
        }
        for o in [
            ReconciliationOutcome::Match,
            ReconciliationOutcome::Overage,
            ReconciliationOutcome::Shortage,
        ] {
            assert_eq!(o.as_str().parse::<ReconciliationOutcome>().unwrap(), o);
        }
    }
}
