//! Stock movements implied by a sale status change.
//!
//! Only completed sales hold stock, so the plan depends solely on whether the
//! old and new status hold stock.

use serde::{Deserialize, Serialize};

use tillpoint_core::DomainError;
use tillpoint_products::{ProductId, StockLevel};

use crate::quote::{SaleLine, stock_by_product};
use crate::status::SaleStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "movements", rename_all = "snake_case")]
pub enum StockPlan {
    /// Nothing moves.
    Hold,
    /// Put the sold quantities back on the shelf.
    Restore(Vec<(ProductId, StockLevel)>),
    /// Take the quantities off the shelf. All or nothing.
    Deduct(Vec<(ProductId, StockLevel)>),
}

impl StockPlan {
    pub fn is_hold(&self) -> bool {
        matches!(self, StockPlan::Hold)
    }
}

pub fn plan_status_change(
    from: SaleStatus,
    to: SaleStatus,
    lines: &[SaleLine],
) -> Result<StockPlan, DomainError> {
    let movements = || Ok::<_, DomainError>(stock_by_product(lines)?.into_iter().collect::<Vec<_>>());
    Ok(match (from.holds_stock(), to.holds_stock()) {
        (true, false) => StockPlan::Restore(movements()?),
        (false, true) => StockPlan::Deduct(movements()?),
        _ => StockPlan::Hold,
    })
}
