//! Exact monetary amounts backed by rust_decimal.
//!
//! Money never passes through binary floating point. Values keep full precision
//! through arithmetic and are rounded half-up to cents only when rendered for
//! display or persistence.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::num::NonZeroU32;
use std::str::FromStr;
use thiserror::Error;

/// Number of fraction digits used at the display/persistence boundary.
pub const CENT_SCALE: u32 = 2;

/// Errors raised by the decimal engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow: {0}")]
    Overflow(String),
}

/// An exact decimal amount of currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(RustDecimal);

impl Money {
    /// The additive identity.
    pub const ZERO: Money = Money(RustDecimal::ZERO);

    /// Wrap an exact decimal value.
    pub fn from_decimal(value: RustDecimal) -> Self {
        Money(value)
    }

    /// Build an amount from integer cents (`150000` -> `1500.00`).
    pub fn from_cents(cents: i64) -> Self {
        Money(RustDecimal::new(cents, CENT_SCALE))
    }

    /// Parse an amount from its decimal string form.
    ///
    /// # Errors
    /// Returns `InvalidAmount` for empty, malformed, or out-of-range input.
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MoneyError::InvalidAmount(s.to_string()));
        }
        RustDecimal::from_str_exact(trimmed)
            .map(Money)
            .map_err(|_| MoneyError::InvalidAmount(s.to_string()))
    }

    /// Get the underlying decimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// True when the amount has no fraction of a cent.
    pub fn is_whole_cents(&self) -> bool {
        self.round_cents() == *self
    }

    /// `self + rhs`, failing instead of wrapping past the decimal range.
    ///
    /// # Errors
    /// Returns `Overflow` when the sum is not representable.
    pub fn checked_add(self, rhs: Money) -> Result<Self, MoneyError> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or_else(|| MoneyError::Overflow(format!("{} + {}", self, rhs)))
    }

    /// Multiply by an exact decimal factor (a rate, a day count).
    ///
    /// # Errors
    /// Returns `Overflow` when the product is not representable.
    pub fn checked_scale(self, factor: RustDecimal) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(factor)
            .map(Money)
            .ok_or_else(|| MoneyError::Overflow(format!("{} * {}", self, factor)))
    }

    /// `self * part / whole`, multiplying first so exact fractions stay exact.
    ///
    /// # Errors
    /// Returns `Overflow` when the intermediate product is not representable.
    pub fn checked_prorate(self, part: i64, whole: NonZeroU32) -> Result<Self, MoneyError> {
        self.checked_scale(RustDecimal::from(part))?
            .checked_div(RustDecimal::from(whole.get()))
    }

    /// Divide by an exact decimal divisor.
    ///
    /// # Errors
    /// Returns `DivisionByZero` when `divisor` is zero and `Overflow` when the
    /// quotient is not representable.
    pub fn checked_div(self, divisor: RustDecimal) -> Result<Self, MoneyError> {
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        self.0
            .checked_div(divisor)
            .map(Money)
            .ok_or_else(|| MoneyError::Overflow(format!("{} / {}", self, divisor)))
    }

    /// The dimensionless ratio `self / other`.
    ///
    /// # Errors
    /// Returns `DivisionByZero` when `other` is zero.
    pub fn ratio(self, other: Money) -> Result<RustDecimal, MoneyError> {
        if other.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        self.0
            .checked_div(other.0)
            .ok_or_else(|| MoneyError::Overflow(format!("{} / {}", self, other)))
    }

    /// Clamp negative values to zero.
    pub fn floor_zero(self) -> Self {
        self.max(Money::ZERO)
    }

    /// Round half-up (midpoint away from zero) to whole cents.
    pub fn round_cents(&self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(CENT_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Render the cent-rounded value with exactly two fraction digits.
    pub fn to_persisted_string(&self) -> String {
        let mut rounded = self.round_cents().0;
        if rounded.is_zero() {
            rounded = RustDecimal::ZERO;
        }
        rounded.rescale(CENT_SCALE);
        rounded.to_string()
    }

    /// Full-precision string without trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        self.0.normalize().to_string()
    }

    /// Native float for chart/display code. Rounded to cents first.
    pub fn to_display_f64(&self) -> f64 {
        self.round_cents().0.to_f64().unwrap_or_default()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_persisted_string())
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_persisted_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Money::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn test_parse_and_persist() {
        assert_eq!(m("1500").to_persisted_string(), "1500.00");
        assert_eq!(m("1500.5").to_persisted_string(), "1500.50");
        assert_eq!(m(" 0.1 ").to_persisted_string(), "0.10");
        assert_eq!(m("-2").to_persisted_string(), "-2.00");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "  ", "abc", "1.2.3", "12,50", "1e3", "NaN"] {
            match Money::parse(bad) {
                Err(MoneyError::InvalidAmount(raw)) => assert_eq!(raw, bad),
                other => panic!("expected InvalidAmount for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_from_cents() {
        assert_eq!(Money::from_cents(150000), m("1500.00"));
        assert_eq!(Money::from_cents(-250), m("-2.50"));
        assert_eq!(Money::from_cents(0), Money::ZERO);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(m("2.345").round_cents(), m("2.35"));
        assert_eq!(m("2.344").round_cents(), m("2.34"));
        assert_eq!(m("-2.345").round_cents(), m("-2.35"));
        assert_eq!(m("11.666666").to_persisted_string(), "11.67");
    }

    #[test]
    fn test_negative_zero_renders_plain() {
        assert_eq!(m("-0.001").to_persisted_string(), "0.00");
    }

    #[test]
    fn test_point_one_plus_point_two_is_exact() {
        assert_eq!(m("0.1") + m("0.2"), m("0.3"));
    }

    #[test]
    fn test_division() {
        let third = m("10").checked_div(RustDecimal::from(3)).unwrap();
        assert_eq!(third.to_persisted_string(), "3.33");
        assert_eq!(
            m("10").checked_div(RustDecimal::ZERO),
            Err(MoneyError::DivisionByZero)
        );
        assert_eq!(m("5").ratio(Money::ZERO), Err(MoneyError::DivisionByZero));
        assert_eq!(m("5").ratio(m("20")).unwrap(), RustDecimal::new(25, 2));
    }

    #[test]
    fn test_prorate_multiplies_first() {
        let thirty = NonZeroU32::new(30).unwrap();
        assert_eq!(m("50").checked_prorate(30, thirty).unwrap(), m("50"));
        assert_eq!(
            m("50").checked_prorate(7, thirty).unwrap().to_persisted_string(),
            "11.67"
        );
        assert_eq!(m("50").checked_prorate(0, thirty).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = Money::from_decimal(RustDecimal::MAX);
        assert!(matches!(
            huge.checked_scale(RustDecimal::from(2)),
            Err(MoneyError::Overflow(_))
        ));
        assert!(matches!(huge.checked_add(m("1")), Err(MoneyError::Overflow(_))));
        assert!(matches!(
            huge.checked_div(RustDecimal::new(1, 10)),
            Err(MoneyError::Overflow(_))
        ));
        assert_eq!(m("2.50").checked_scale(RustDecimal::from(4)).unwrap(), m("10"));
        assert_eq!(m("0.10").checked_add(m("0.20")).unwrap(), m("0.3"));
    }

    #[test]
    fn test_whole_cents() {
        assert!(m("12.30").is_whole_cents());
        assert!(m("12.3").is_whole_cents());
        assert!(m("-4").is_whole_cents());
        assert!(!m("0.004").is_whole_cents());
        assert!(!m("12.345").is_whole_cents());
    }

    #[test]
    fn test_min_max_floor() {
        assert_eq!(m("3").max(m("4")), m("4"));
        assert_eq!(m("3").min(m("4")), m("3"));
        assert_eq!(m("-1").floor_zero(), Money::ZERO);
        assert!(m("-1").is_negative());
        assert!(!Money::ZERO.is_positive());
    }

    #[test]
    fn test_json_is_string() {
        let json = serde_json::to_value(m("1500")).unwrap();
        assert!(json.is_string());
        assert_eq!(json, "1500.00");

        let back: Money = serde_json::from_str("\"12.34\"").unwrap();
        assert_eq!(back, m("12.34"));
        assert!(serde_json::from_str::<Money>("12.34").is_err());
    }

    #[test]
    fn test_display_f64_is_rounded() {
        assert_eq!(m("10.005").to_display_f64(), 10.01);
    }

    proptest! {
        #[test]
        fn prop_add_commutes(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000) {
            let (x, y) = (Money::from_cents(a), Money::from_cents(b));
            prop_assert_eq!(x + y, y + x);
        }

        #[test]
        fn prop_string_roundtrip_lossless(cents in -1_000_000_000_000i64..1_000_000_000_000) {
            let original = Money::from_cents(cents);
            let once = Money::parse(&original.to_persisted_string()).unwrap();
            let twice = Money::parse(&once.to_persisted_string()).unwrap();
            prop_assert_eq!(original, once);
            prop_assert_eq!(once, twice);
        }
    }
}
