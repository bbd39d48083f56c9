//! Checkout and the sale lifecycle.
//!
//! A sale spans two kinds of aggregate: the [`Sale`] itself and one [`Product`]
//! per line. The event store has no cross-stream transactions, so every flow
//! here runs under the tenant lock and undoes the stock it already moved when a
//! later step fails.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use tillpoint_auth::{Principal, permissions};
use tillpoint_core::{Aggregate, AggregateId, DomainError, Money, TenantId};
use tillpoint_events::{EventBus, EventEnvelope};
use tillpoint_products::{Product, ProductId, StockChange, StockLevel, StockReason, UnitType};
use tillpoint_sales::{
    CartItem, ChangeSaleStatus, DeleteSale, InvoiceNumber, OpenSale, PaymentMethod, ProductSnapshot,
    Quote, ReviseSale, Sale, SaleCommand, SaleId, SaleStatus, StockPlan, plan_status_change, quote,
};

use super::{PosError, PosResult, Till};
use crate::event_store::EventStore;
use crate::projections::sales::AGGREGATE_TYPE;
use crate::projections::{SaleFilter, SaleReadModel};
use crate::read_model::Page;

pub const SALES_PAGE_SIZE: usize = 20;

/// One cart line as submitted by the till.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRequestItem {
    pub product_id: ProductId,
    pub quantity: u64,
    pub unit_type: UnitType,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub items: Vec<CartRequestItem>,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub amount_paid: Money,
    /// Pending sale to finish instead of opening a new one.
    pub continue_sale_id: Option<SaleId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub sale: SaleReadModel,
    pub continued: bool,
}

/// A line of a pending sale, reloaded into the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCartLine {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub unit_type: UnitType,
    pub quantity: u64,
    pub unit_price: Money,
    pub line_total: Money,
    /// Shelf stock plus this line, the ceiling the till shows while editing.
    pub stock: StockLevel,
}

type Movements = [(ProductId, StockLevel)];

fn sale_id(id: AggregateId) -> SaleId {
    SaleId::new(id)
}

fn product_id(id: AggregateId) -> ProductId {
    ProductId::new(id)
}

impl<S, B> Till<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Price a cart against current stock without touching anything.
    pub fn preview(&self, tenant_id: TenantId, items: &[CartRequestItem]) -> PosResult<Quote> {
        let cart = self.cart(tenant_id, items)?;
        Ok(quote(&cart)?)
    }

    pub fn checkout(
        &self,
        clerk: &Principal,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> PosResult<CheckoutOutcome> {
        let tenant_id = clerk.tenant_id;
        if !matches!(request.status, SaleStatus::Completed | SaleStatus::Pending) {
            return Err(DomainError::validation("a sale can only be checked out as completed or pending").into());
        }
        self.serialized(tenant_id, || {
            let cart = self.cart(tenant_id, &request.items)?;
            let priced = quote(&cart)?;
            let (sid, continued) = match request.continue_sale_id {
                None => (self.open_sale(clerk, &request, priced, now)?, false),
                Some(sid) => {
                    self.finish_pending(clerk, sid, &request, priced, now)?;
                    (sid, true)
                }
            };
            let sale = self.read_sale(tenant_id, sid)?;
            info!(
                %tenant_id,
                sale_id = %sid,
                invoice = %sale.invoice_number,
                status = sale.status.as_str(),
                total = %sale.total,
                continued,
                "checkout"
            );
            Ok(CheckoutOutcome { sale, continued })
        })
    }

    fn open_sale(
        &self,
        clerk: &Principal,
        request: &CheckoutRequest,
        priced: Quote,
        now: DateTime<Utc>,
    ) -> PosResult<SaleId> {
        let tenant_id = clerk.tenant_id;
        let invoice_number =
            InvoiceNumber::next_for(now.year(), self.projections.sales.invoice_numbers(tenant_id))?;
        let id = AggregateId::new();
        let sid = sale_id(id);
        let needs = priced.stock_needed()?.into_iter().collect::<Vec<_>>();

        self.execute(
            tenant_id,
            id,
            AGGREGATE_TYPE,
            SaleCommand::Open(OpenSale {
                tenant_id,
                sale_id: sid,
                invoice_number,
                clerk_id: clerk.user_id,
                clerk_username: clerk.username.clone(),
                lines: priced.lines,
                status: request.status,
                payment_method: request.payment_method,
                amount_paid: request.amount_paid,
                occurred_at: now,
            }),
            |_, id| Sale::empty(sale_id(id)),
        )?;

        if request.status.holds_stock() {
            if let Err(err) = self.deduct_all(tenant_id, &needs, now) {
                self.discard_sale(tenant_id, sid, now)?;
                return Err(err);
            }
        }
        Ok(sid)
    }

    fn finish_pending(
        &self,
        clerk: &Principal,
        sid: SaleId,
        request: &CheckoutRequest,
        priced: Quote,
        now: DateTime<Utc>,
    ) -> PosResult<()> {
        let tenant_id = clerk.tenant_id;
        let sale: Sale = self.load(tenant_id, sid.0, |_, id| Sale::empty(sale_id(id)))?;
        if !sale.is_live() || sale.status() != SaleStatus::Pending {
            return Err(DomainError::validation("Invalid pending sale").into());
        }
        if sale.clerk_id().is_some_and(|owner| !clerk.owns_or_supervises(owner)) {
            return Err(DomainError::forbidden("Access denied").into());
        }

        let needs = priced.stock_needed()?.into_iter().collect::<Vec<_>>();
        let revise = SaleCommand::Revise(ReviseSale {
            tenant_id,
            sale_id: sid,
            lines: priced.lines,
            status: request.status,
            payment_method: request.payment_method,
            amount_paid: request.amount_paid,
            occurred_at: now,
        });
        // Surface payment problems before any stock moves.
        sale.handle(&revise)?;

        // A pending sale holds no stock, so there is nothing to give back first.
        let deducted = request.status.holds_stock();
        if deducted {
            self.deduct_all(tenant_id, &needs, now)?;
        }
        if let Err(err) = self.execute(tenant_id, sid.0, AGGREGATE_TYPE, revise, |_, id| Sale::empty(sale_id(id))) {
            if deducted {
                self.restore_all(tenant_id, &needs, now)?;
            }
            return Err(err);
        }
        Ok(())
    }

    /// Move a sale to `to`, reconciling stock. Completing a sale needs every
    /// line in stock; otherwise nothing changes.
    pub fn change_sale_status(
        &self,
        tenant_id: TenantId,
        sid: SaleId,
        to: SaleStatus,
        now: DateTime<Utc>,
    ) -> PosResult<SaleReadModel> {
        self.serialized(tenant_id, || {
            let sale: Sale = self.load(tenant_id, sid.0, |_, id| Sale::empty(sale_id(id)))?;
            if !sale.is_live() {
                return Err(DomainError::not_found("sale").into());
            }
            let from = sale.status();
            if from == to {
                return self.read_sale(tenant_id, sid);
            }

            let command = SaleCommand::ChangeStatus(ChangeSaleStatus {
                tenant_id,
                sale_id: sid,
                status: to,
                occurred_at: now,
            });
            let make = |_, id| Sale::empty(sale_id(id));

            match plan_status_change(from, to, sale.lines())? {
                StockPlan::Hold => {
                    self.execute(tenant_id, sid.0, AGGREGATE_TYPE, command, make)?;
                }
                StockPlan::Restore(movements) => {
                    self.execute(tenant_id, sid.0, AGGREGATE_TYPE, command, make)?;
                    self.restore_all(tenant_id, &movements, now)?;
                }
                StockPlan::Deduct(movements) => {
                    self.ensure_available(tenant_id, &movements)?;
                    self.deduct_all(tenant_id, &movements, now)?;
                    if let Err(err) = self.execute(tenant_id, sid.0, AGGREGATE_TYPE, command, make) {
                        self.restore_all(tenant_id, &movements, now)?;
                        return Err(err);
                    }
                }
            }

            info!(%tenant_id, sale_id = %sid, from = from.as_str(), to = to.as_str(), "sale status changed");
            self.read_sale(tenant_id, sid)
        })
    }

    /// Lines of a pending sale for the till to edit.
    pub fn load_pending(&self, clerk: &Principal, sid: SaleId) -> PosResult<Vec<PendingCartLine>> {
        let tenant_id = clerk.tenant_id;
        let sale = self.read_sale(tenant_id, sid)?;
        if sale.status != SaleStatus::Pending {
            return Err(DomainError::validation("Only pending sales can be continued").into());
        }
        if !clerk.owns_or_supervises(sale.clerk_id) {
            return Err(DomainError::forbidden("Access denied").into());
        }

        sale.lines
            .iter()
            .map(|line| {
                let shelf = self
                    .projections
                    .products
                    .get(tenant_id, &line.product_id)
                    .map(|p| p.stock)
                    .unwrap_or(StockLevel::EMPTY);
                Ok(PendingCartLine {
                    product_id: line.product_id,
                    name: line.product_name.clone(),
                    sku: line.sku.clone(),
                    unit_type: line.unit_type,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total,
                    stock: StockLevel::from_quarters(
                        shelf.quarters().saturating_add(line.stock_needed()?.quarters()),
                    ),
                })
            })
            .collect()
    }

    /// A single receipt. Cashiers only see their own sales.
    pub fn sale_for(&self, viewer: &Principal, sid: SaleId) -> PosResult<SaleReadModel> {
        let sale = self.read_sale(viewer.tenant_id, sid)?;
        if !viewer.owns_or_supervises(sale.clerk_id) {
            return Err(DomainError::forbidden("Access denied").into());
        }
        Ok(sale)
    }

    /// Newest first. Without `sales.read_all` only the viewer's own sales show.
    pub fn list_sales(&self, viewer: &Principal, status: Option<SaleStatus>, page: usize) -> Page<SaleReadModel> {
        let filter = SaleFilter {
            status,
            clerk_id: (!viewer.has(&permissions::SALES_READ_ALL)).then_some(viewer.user_id),
            ..SaleFilter::default()
        };
        Page::of(
            self.projections.sales.list(viewer.tenant_id, &filter),
            page,
            SALES_PAGE_SIZE,
        )
    }

    /// Remove a sale record. Stock is left as it is.
    pub fn delete_sale(&self, tenant_id: TenantId, sid: SaleId, now: DateTime<Utc>) -> PosResult<()> {
        self.serialized(tenant_id, || self.discard_sale(tenant_id, sid, now))
    }

    /// Delete every listed sale that exists; returns how many went.
    pub fn bulk_delete_sales(&self, tenant_id: TenantId, ids: &[SaleId], now: DateTime<Utc>) -> PosResult<usize> {
        self.serialized(tenant_id, || {
            let mut deleted = 0;
            for sid in ids {
                if self.projections.sales.get(tenant_id, sid).is_none() {
                    continue;
                }
                self.discard_sale(tenant_id, *sid, now)?;
                deleted += 1;
            }
            info!(%tenant_id, requested = ids.len(), deleted, "bulk sale delete");
            Ok(deleted)
        })
    }

    fn discard_sale(&self, tenant_id: TenantId, sid: SaleId, now: DateTime<Utc>) -> PosResult<()> {
        self.execute(
            tenant_id,
            sid.0,
            AGGREGATE_TYPE,
            SaleCommand::Delete(DeleteSale {
                tenant_id,
                sale_id: sid,
                occurred_at: now,
            }),
            |_, id| Sale::empty(sale_id(id)),
        )?;
        Ok(())
    }

    fn cart(&self, tenant_id: TenantId, items: &[CartRequestItem]) -> PosResult<Vec<CartItem>> {
        items
            .iter()
            .map(|item| {
                let product: Product = self.load(tenant_id, item.product_id.0, |_, id| Product::empty(product_id(id)))?;
                let (true, Some(pricing)) = (product.is_live(), product.pricing()) else {
                    return Err(DomainError::not_found("product").into());
                };
                Ok(CartItem {
                    product: ProductSnapshot {
                        product_id: item.product_id,
                        name: product.name().to_string(),
                        sku: product.sku().to_string(),
                        pricing,
                        stock: product.stock(),
                    },
                    quantity: item.quantity,
                    unit_type: item.unit_type,
                })
            })
            .collect()
    }

    fn ensure_available(&self, tenant_id: TenantId, movements: &Movements) -> PosResult<()> {
        for (pid, needed) in movements {
            let product: Product = self.load(tenant_id, pid.0, |_, id| Product::empty(product_id(id)))?;
            if !product.is_live() {
                return Err(DomainError::not_found("product").into());
            }
            if !product.stock().covers(*needed) {
                return Err(DomainError::insufficient_stock(format!(
                    "Insufficient stock for {}. Cannot complete sale.",
                    product.name()
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Take every movement off the shelf, or none of them.
    pub(crate) fn deduct_all(&self, tenant_id: TenantId, movements: &Movements, now: DateTime<Utc>) -> PosResult<()> {
        for (idx, (pid, qty)) in movements.iter().enumerate() {
            if let Err(err) = self.move_stock(tenant_id, *pid, StockChange::Deduct(*qty), StockReason::Sale, now) {
                self.restore_all(tenant_id, &movements[..idx], now)?;
                return Err(err);
            }
        }
        Ok(())
    }

    fn restore_all(&self, tenant_id: TenantId, movements: &Movements, now: DateTime<Utc>) -> PosResult<()> {
        let mut failed = Vec::new();
        for (pid, qty) in movements {
            if let Err(err) = self.move_stock(tenant_id, *pid, StockChange::Add(*qty), StockReason::SaleReversal, now) {
                error!(%tenant_id, product_id = %pid, quarters = qty.quarters(), error = %err, "stock restore failed");
                failed.push(pid.to_string());
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(PosError::Compensation(format!(
                "could not restore stock for {}",
                failed.join(", ")
            )))
        }
    }

    fn read_sale(&self, tenant_id: TenantId, sid: SaleId) -> PosResult<SaleReadModel> {
        self.projections
            .sales
            .get(tenant_id, &sid)
            .ok_or_else(|| DomainError::not_found("sale").into())
    }
}
