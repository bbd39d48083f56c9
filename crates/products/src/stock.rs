//! Stock on hand, counted in quarter packs so fractional sales stay exact.

use serde::{Deserialize, Serialize};

use crate::pricing::UnitType;

/// At or below this many packs a product is flagged as running low.
pub const LOW_STOCK_PACKS: u64 = 5;
/// Largest quantity a product may hold, in packs.
pub const MAX_STOCK_PACKS: u64 = 999_999;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockLevel(u64);

impl StockLevel {
    pub const EMPTY: StockLevel = StockLevel(0);
    pub const MAX: StockLevel = StockLevel(MAX_STOCK_PACKS * 4);

    pub const fn from_quarters(quarters: u64) -> Self {
        Self(quarters)
    }

    pub const fn from_packs(packs: u64) -> Self {
        Self(packs * 4)
    }

    pub const fn quarters(self) -> u64 {
        self.0
    }

    /// Packs on hand, e.g. `2.5` for two and a half packs.
    pub fn packs(self) -> f64 {
        self.0 as f64 / 4.0
    }

    /// Whole packs on hand, ignoring any opened pack.
    pub fn whole_packs(self) -> u64 {
        self.0 / 4
    }

    /// Human-readable pack count: `3`, `2.5`, `0.25`.
    pub fn display_packs(self) -> String {
        match self.0 % 4 {
            0 => format!("{}", self.0 / 4),
            1 => format!("{}.25", self.0 / 4),
            2 => format!("{}.5", self.0 / 4),
            _ => format!("{}.75", self.0 / 4),
        }
    }

    pub fn covers(self, needed: StockLevel) -> bool {
        self.0 >= needed.0
    }

    pub fn checked_sub(self, other: StockLevel) -> Option<StockLevel> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_add(self, other: StockLevel) -> Option<StockLevel> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .filter(|s| *s <= StockLevel::MAX)
    }

    pub fn is_out(self) -> bool {
        self.0 == 0
    }

    pub fn is_low(self) -> bool {
        self.0 <= LOW_STOCK_PACKS * 4
    }

    pub fn status(self) -> StockStatus {
        if self.is_out() {
            StockStatus::OutOfStock
        } else if self.is_low() {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

/// Stock needed to sell `quantity` units of `unit`.
pub fn required_stock(unit: UnitType, quantity: u64) -> Option<StockLevel> {
    unit.quarters().checked_mul(quantity).map(StockLevel)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn label(self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::OutOfStock => "Out of Stock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractional_display() {
        assert_eq!(StockLevel::from_quarters(10).display_packs(), "2.5");
        assert_eq!(StockLevel::from_quarters(1).display_packs(), "0.25");
        assert_eq!(StockLevel::from_quarters(7).display_packs(), "1.75");
        assert_eq!(StockLevel::from_packs(12).display_packs(), "12");
    }

    #[test]
    fn half_packs_consume_two_quarters() {
        let need = required_stock(UnitType::Half, 3).unwrap();
        assert_eq!(need.quarters(), 6);
        let left = StockLevel::from_packs(2).checked_sub(need).unwrap();
        assert_eq!(left.display_packs(), "0.5");
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(StockLevel::EMPTY.status(), StockStatus::OutOfStock);
        assert_eq!(StockLevel::from_quarters(1).status(), StockStatus::LowStock);
        assert_eq!(StockLevel::from_packs(5).status(), StockStatus::LowStock);
        assert_eq!(StockLevel::from_quarters(21).status(), StockStatus::InStock);
        assert_eq!(StockStatus::OutOfStock.label(), "Out of Stock");
    }

    #[test]
    fn adding_past_max_is_refused() {
        assert!(StockLevel::MAX.checked_add(StockLevel::from_quarters(1)).is_none());
        assert!(StockLevel::EMPTY.checked_add(StockLevel::MAX).is_some());
    }
}
