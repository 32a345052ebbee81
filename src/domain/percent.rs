//! Rates expressed in percent (`10` means 10%).

use crate::domain::money::MoneyError;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const ONE_HUNDRED: RustDecimal = RustDecimal::ONE_HUNDRED;

/// An exact percentage rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent(RustDecimal);

impl Percent {
    pub const ZERO: Percent = Percent(RustDecimal::ZERO);
    pub const HUNDRED: Percent = Percent(ONE_HUNDRED);

    pub fn new(value: RustDecimal) -> Self {
        Percent(value)
    }

    /// Parse a percentage from its decimal string form.
    ///
    /// # Errors
    /// Returns `InvalidAmount` for malformed input.
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        RustDecimal::from_str_exact(s.trim())
            .map(Percent)
            .map_err(|_| MoneyError::InvalidAmount(s.to_string()))
    }

    pub fn value(&self) -> RustDecimal {
        self.0
    }

    /// The rate as a fraction (`10%` -> `0.10`).
    pub fn as_fraction(&self) -> RustDecimal {
        self.0 / ONE_HUNDRED
    }

    /// `100% - self`.
    pub fn complement(&self) -> Percent {
        Percent(ONE_HUNDRED - self.0)
    }

    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Percent {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Percent::parse(&raw).map_err(serde::de::Error::custom)
    }
}
