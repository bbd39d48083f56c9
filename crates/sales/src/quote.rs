//! Cart pricing: turns cart lines into priced sale lines and checks stock.
//!
//! Stock is checked per product, not per line: two half-pack lines of the same
//! product need a full pack between them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tillpoint_core::{DomainError, Money};
use tillpoint_products::{Pricing, ProductId, StockLevel, UnitType, required_stock};

/// What the quote needs to know about a product at the moment of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub pricing: Pricing,
    pub stock: StockLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: ProductSnapshot,
    pub quantity: u64,
    pub unit_type: UnitType,
}

/// One priced line, frozen on the sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub unit_type: UnitType,
    pub quantity: u64,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub line_total: Money,
    /// Signed: a product sold below purchase price loses money.
    pub line_profit: i64,
}

impl SaleLine {
    pub fn price(product: &ProductSnapshot, unit_type: UnitType, quantity: u64) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::validation(format!(
                "quantity for {} must be at least 1",
                product.name
            )));
        }
        if line_stock(unit_type, quantity).is_none() {
            return Err(DomainError::validation(format!(
                "quantity for {} exceeds what a shelf can hold",
                product.name
            )));
        }
        let unit_price = product.pricing.price_for(unit_type);
        let unit_cost = product.pricing.cost_for(unit_type);
        let line_total = unit_price
            .times(quantity)
            .ok_or_else(|| DomainError::validation("line total too large"))?;
        let line_profit = unit_price
            .signed_diff(unit_cost)
            .checked_mul(quantity as i64)
            .ok_or_else(|| DomainError::validation("line profit too large"))?;

        Ok(Self {
            product_id: product.product_id,
            product_name: product.name.clone(),
            sku: product.sku.clone(),
            unit_type,
            quantity,
            unit_price,
            unit_cost,
            line_total,
            line_profit,
        })
    }

    /// Stock this line takes off the shelf.
    ///
    /// Lines built by [`SaleLine::price`] always fit on a shelf; the error is
    /// for lines read back from elsewhere.
    pub fn stock_needed(&self) -> Result<StockLevel, DomainError> {
        line_stock(self.unit_type, self.quantity)
            .ok_or_else(|| DomainError::validation(format!("quantity for {} is too large", self.product_name)))
    }
}

fn line_stock(unit: UnitType, quantity: u64) -> Option<StockLevel> {
    required_stock(unit, quantity).filter(|need| StockLevel::MAX.covers(*need))
}

/// Totals over a set of lines.
pub fn sum_lines(lines: &[SaleLine]) -> Result<(Money, i64), DomainError> {
    let mut total = Money::ZERO;
    let mut profit: i64 = 0;
    for line in lines {
        total = total
            .checked_add(line.line_total)
            .ok_or_else(|| DomainError::validation("sale total too large"))?;
        profit = profit
            .checked_add(line.line_profit)
            .ok_or_else(|| DomainError::validation("sale profit too large"))?;
    }
    Ok((total, profit))
}

/// Stock needed per product, summed over all lines.
pub fn stock_by_product(lines: &[SaleLine]) -> Result<BTreeMap<ProductId, StockLevel>, DomainError> {
    let mut needed: BTreeMap<ProductId, StockLevel> = BTreeMap::new();
    for line in lines {
        let entry = needed.entry(line.product_id).or_default();
        *entry = entry.checked_add(line.stock_needed()?).ok_or_else(|| {
            DomainError::validation(format!("quantity for {} is too large", line.product_name))
        })?;
    }
    Ok(needed)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub lines: Vec<SaleLine>,
    pub total: Money,
    pub total_profit: i64,
}

impl Quote {
    pub fn stock_needed(&self) -> Result<BTreeMap<ProductId, StockLevel>, DomainError> {
        stock_by_product(&self.lines)
    }
}

/// Price a cart and check it against the snapshots' stock.
///
/// The first product that cannot be covered aborts the quote.
pub fn quote(items: &[CartItem]) -> Result<Quote, DomainError> {
    if items.is_empty() {
        return Err(DomainError::validation("No items in cart"));
    }

    let lines = items
        .iter()
        .map(|item| SaleLine::price(&item.product, item.unit_type, item.quantity))
        .collect::<Result<Vec<_>, _>>()?;

    let needed = stock_by_product(&lines)?;
    for item in items {
        let Some(want) = needed.get(&item.product.product_id) else {
            continue;
        };
        if !item.product.stock.covers(*want) {
            return Err(DomainError::insufficient_stock(format!(
                "Insufficient stock for {}. Available: {}",
                item.product.name,
                item.product.stock.display_packs()
            )));
        }
    }

    let (total, total_profit) = sum_lines(&lines)?;
    Ok(Quote {
        lines,
        total,
        total_profit,
    })
}
