//! Money in minor currency units.
//!
//! All amounts are stored as whole pesewas (1/100 GHS). Integer arithmetic keeps
//! totals exact; the only rounding happens in [`Money::split`].

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// ISO code printed next to amounts.
pub const CURRENCY: &str = "GHS";

/// Non-negative amount in minor units.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parse a decimal amount such as `"12"`, `"12.5"` or `"12.50"`.
    pub fn parse(input: &str) -> DomainResult<Self> {
        let s = input.trim();
        let bad = || DomainError::validation(format!("invalid amount '{input}'"));
        if s.is_empty() {
            return Err(bad());
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(bad());
        }
        if frac.len() > 2 || !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(bad());
        }

        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| bad())? };
        let frac: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| bad())? * 10,
            _ => frac.parse().map_err(|_| bad())?,
        };

        whole
            .checked_mul(100)
            .and_then(|m| m.checked_add(frac))
            .map(Self)
            .ok_or_else(bad)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Money) -> Money {
        Self(self.0.saturating_sub(other.0))
    }

    /// Amount times a quantity.
    pub fn times(self, quantity: u64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Self)
    }

    /// Divide into `parts`, rounding half up to the nearest minor unit.
    ///
    /// `parts` of zero yields zero.
    pub fn split(self, parts: u64) -> Money {
        if parts == 0 {
            return Money::ZERO;
        }
        let q = self.0 / parts;
        let r = self.0 % parts;
        if r * 2 >= parts { Self(q + 1) } else { Self(q) }
    }

    /// Signed difference `self - other`, in minor units.
    pub fn signed_diff(self, other: Money) -> i64 {
        self.0 as i64 - other.0 as i64
    }

    /// Format as a plain decimal, e.g. `12.50`.
    pub fn to_decimal_string(self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{CURRENCY} {}", self.to_decimal_string())
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| Money(acc.0.saturating_add(m.0)))
    }
}

/// `part / whole * 100`, rounded to two decimals. Zero when `whole` is zero.
pub fn percentage(part: i64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_shapes() {
        assert_eq!(Money::parse("12").unwrap(), Money::from_minor(1200));
        assert_eq!(Money::parse("12.5").unwrap(), Money::from_minor(1250));
        assert_eq!(Money::parse("12.05").unwrap(), Money::from_minor(1205));
        assert_eq!(Money::parse(".75").unwrap(), Money::from_minor(75));
        assert_eq!(Money::parse(" 0.01 ").unwrap(), Money::from_minor(1));
    }

    #[test]
    fn rejects_bad_amounts() {
        for bad in ["", ".", "-1", "1.234", "abc", "1,50"] {
            assert!(Money::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn split_rounds_half_up() {
        assert_eq!(Money::from_minor(1001).split(2), Money::from_minor(501));
        assert_eq!(Money::from_minor(1000).split(4), Money::from_minor(250));
        assert_eq!(Money::from_minor(1001).split(4), Money::from_minor(250));
        assert_eq!(Money::from_minor(1002).split(4), Money::from_minor(251));
        assert_eq!(Money::from_minor(5).split(0), Money::ZERO);
    }

    #[test]
    fn displays_with_currency() {
        assert_eq!(Money::from_minor(1250).to_string(), "GHS 12.50");
        assert_eq!(Money::from_minor(7).to_string(), "GHS 0.07");
    }

    #[test]
    fn percentage_guards_zero() {
        assert_eq!(percentage(50, 0), 0.0);
        assert_eq!(percentage(250, 1000), 25.0);
        assert_eq!(percentage(-100, 400), -25.0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 500, ..ProptestConfig::default() })]

            #[test]
            fn split_is_within_half_a_unit(minor in 0u64..10_000_000, parts in 1u64..8) {
                let share = Money::from_minor(minor).split(parts).minor();
                let exact = minor as f64 / parts as f64;
                prop_assert!((share as f64 - exact).abs() <= 0.5);
            }

            #[test]
            fn decimal_string_parses_back(minor in 0u64..100_000_000_000) {
                let m = Money::from_minor(minor);
                prop_assert_eq!(Money::parse(&m.to_decimal_string()).unwrap(), m);
            }
        }
    }
}
