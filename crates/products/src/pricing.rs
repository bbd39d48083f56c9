//! Pack-fraction pricing.
//!
//! A product is bought and stocked in packs but may be sold as a full, half or
//! quarter pack. Price, cost and stock consumption all follow the unit type.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tillpoint_core::{DomainError, Money, money::percentage};

/// Largest price accepted anywhere in the catalog (999,999.99).
pub const MAX_PRICE: Money = Money::from_minor(99_999_999);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    #[default]
    Full,
    Half,
    Quarter,
}

impl UnitType {
    pub const ALL: [UnitType; 3] = [UnitType::Full, UnitType::Half, UnitType::Quarter];

    /// Lenient parse used at the till: anything unrecognised sells as a full pack.
    pub fn parse_or_full(raw: &str) -> Self {
        raw.parse().unwrap_or(UnitType::Full)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::Full => "full",
            UnitType::Half => "half",
            UnitType::Quarter => "quarter",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UnitType::Full => "Full Pack",
            UnitType::Half => "Half Pack",
            UnitType::Quarter => "Quarter Pack",
        }
    }

    /// How many of this unit make up one pack.
    pub fn per_pack(self) -> u64 {
        match self {
            UnitType::Full => 1,
            UnitType::Half => 2,
            UnitType::Quarter => 4,
        }
    }

    /// Stock consumed by one unit, in quarter packs.
    pub fn quarters(self) -> u64 {
        4 / self.per_pack()
    }
}

impl core::fmt::Display for UnitType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(UnitType::Full),
            "half" => Ok(UnitType::Half),
            "quarter" => Ok(UnitType::Quarter),
            other => Err(DomainError::validation(format!("unknown unit type '{other}'"))),
        }
    }
}

/// The three prices a product carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    /// What one pack costs the shop.
    pub purchase_price: Money,
    /// Shelf price of one pack.
    pub full_price: Money,
    /// Explicit half-pack price; half of `full_price` when absent.
    pub half_price: Option<Money>,
}

impl Pricing {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (label, price) in [
            ("purchase price", Some(self.purchase_price)),
            ("full price", Some(self.full_price)),
            ("half price", self.half_price),
        ] {
            if let Some(p) = price {
                if p > MAX_PRICE {
                    return Err(DomainError::validation(format!(
                        "{label} cannot exceed {}",
                        MAX_PRICE.to_decimal_string()
                    )));
                }
            }
        }
        if let Some(half) = self.half_price {
            if half > self.full_price {
                return Err(DomainError::validation("half price cannot exceed full price"));
            }
        }
        Ok(())
    }

    pub fn half_price_or_default(&self) -> Money {
        self.half_price.unwrap_or_else(|| self.full_price.split(2))
    }

    pub fn quarter_price(&self) -> Money {
        self.full_price.split(4)
    }

    /// Selling price of one unit.
    pub fn price_for(&self, unit: UnitType) -> Money {
        match unit {
            UnitType::Full => self.full_price,
            UnitType::Half => self.half_price_or_default(),
            UnitType::Quarter => self.quarter_price(),
        }
    }

    /// Cost basis of one unit.
    pub fn cost_for(&self, unit: UnitType) -> Money {
        self.purchase_price.split(unit.per_pack())
    }

    /// Gross profit of one unit, negative when sold below cost.
    pub fn profit_for(&self, unit: UnitType) -> i64 {
        self.price_for(unit).signed_diff(self.cost_for(unit))
    }

    /// Margin on a full pack, as a percentage of the shelf price.
    pub fn margin_percent(&self) -> f64 {
        percentage(
            self.full_price.signed_diff(self.purchase_price),
            self.full_price.minor(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing(purchase: u64, full: u64, half: Option<u64>) -> Pricing {
        Pricing {
            purchase_price: Money::from_minor(purchase),
            full_price: Money::from_minor(full),
            half_price: half.map(Money::from_minor),
        }
    }

    #[test]
    fn unit_prices_follow_pack_fraction() {
        let p = pricing(800, 1200, None);
        assert_eq!(p.price_for(UnitType::Full).minor(), 1200);
        assert_eq!(p.price_for(UnitType::Half).minor(), 600);
        assert_eq!(p.price_for(UnitType::Quarter).minor(), 300);

        assert_eq!(p.cost_for(UnitType::Full).minor(), 800);
        assert_eq!(p.cost_for(UnitType::Half).minor(), 400);
        assert_eq!(p.cost_for(UnitType::Quarter).minor(), 200);
    }

    #[test]
    fn explicit_half_price_wins() {
        let p = pricing(800, 1200, Some(650));
        assert_eq!(p.price_for(UnitType::Half).minor(), 650);
        assert_eq!(p.profit_for(UnitType::Half), 250);
    }

    #[test]
    fn selling_below_cost_is_negative_profit() {
        let p = pricing(1500, 1200, None);
        assert_eq!(p.profit_for(UnitType::Full), -300);
        assert_eq!(p.margin_percent(), -25.0);
    }

    #[test]
    fn zero_shelf_price_has_zero_margin() {
        assert_eq!(pricing(100, 0, None).margin_percent(), 0.0);
    }

    #[test]
    fn validation_limits() {
        assert!(pricing(100, 200, Some(300)).validate().is_err());
        assert!(pricing(100, MAX_PRICE.minor() + 1, None).validate().is_err());
        assert!(pricing(100, 200, Some(100)).validate().is_ok());
    }

    #[test]
    fn unknown_unit_sells_as_full() {
        assert_eq!(UnitType::parse_or_full("HALF"), UnitType::Half);
        assert_eq!(UnitType::parse_or_full("dozen"), UnitType::Full);
        assert_eq!(UnitType::Quarter.quarters(), 1);
        assert_eq!(UnitType::Half.quarters(), 2);
        assert_eq!(UnitType::Full.quarters(), 4);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 1000, ..ProptestConfig::default() })]

            /// Selling a pack as quarters never earns more than a rounding error over the full pack.
            #[test]
            fn quarters_add_up_to_about_one_pack(full in 0u64..MAX_PRICE.minor()) {
                let p = pricing(0, full, None);
                let four_quarters = p.price_for(UnitType::Quarter).minor() * 4;
                prop_assert!(four_quarters.abs_diff(full) <= 2);
            }

            #[test]
            fn cost_never_exceeds_purchase_price(purchase in 0u64..MAX_PRICE.minor()) {
                let p = pricing(purchase, purchase, None);
                for unit in UnitType::ALL {
                    prop_assert!(p.cost_for(unit).minor() * unit.per_pack() <= purchase + unit.per_pack());
                }
            }
        }
    }
}
