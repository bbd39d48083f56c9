//! Sales ledger read model: receipts, history and the source for reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use tillpoint_auth::UserId;
use tillpoint_core::{Money, TenantId};
use tillpoint_events::EventEnvelope;
use tillpoint_products::ProductId;
use tillpoint_sales::{InvoiceNumber, Payment, SaleEvent, SaleId, SaleLine, SaleStatus};

use super::cursor::{ProjectionError, StreamCursors, decode};
use crate::read_model::TenantStore;

pub const AGGREGATE_TYPE: &str = "sales.sale";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleReadModel {
    pub sale_id: SaleId,
    pub invoice_number: InvoiceNumber,
    pub clerk_id: UserId,
    pub clerk_username: String,
    pub status: SaleStatus,
    pub lines: Vec<SaleLine>,
    pub total: Money,
    pub total_profit: i64,
    pub payment: Payment,
    pub sale_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SaleReadModel {
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub clerk_id: Option<UserId>,
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
}

impl SaleFilter {
    fn matches(&self, sale: &SaleReadModel) -> bool {
        self.status.is_none_or(|s| sale.status == s)
            && self.clerk_id.is_none_or(|c| sale.clerk_id == c)
            && self.from.is_none_or(|f| sale.sale_date >= f)
            && self.until.is_none_or(|u| sale.sale_date < u)
    }
}

#[derive(Debug)]
pub struct SalesLedgerProjection<S>
where
    S: TenantStore<SaleId, SaleReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> SalesLedgerProjection<S>
where
    S: TenantStore<SaleId, SaleReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, sale_id: &SaleId) -> Option<SaleReadModel> {
        self.store.get(tenant_id, sale_id)
    }

    /// Matching sales, newest first.
    pub fn list(&self, tenant_id: TenantId, filter: &SaleFilter) -> Vec<SaleReadModel> {
        let mut sales: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        sales.sort_by(|a, b| {
            b.sale_date
                .cmp(&a.sale_date)
                .then_with(|| b.invoice_number.cmp(&a.invoice_number))
        });
        sales
    }

    pub fn invoice_numbers(&self, tenant_id: TenantId) -> Vec<InvoiceNumber> {
        self.store
            .list(tenant_id)
            .into_iter()
            .map(|s| s.invoice_number)
            .collect()
    }

    pub fn references_product(&self, tenant_id: TenantId, product_id: ProductId) -> bool {
        self.store
            .list(tenant_id)
            .iter()
            .any(|s| s.lines.iter().any(|l| l.product_id == product_id))
    }

    pub fn has_sales_by(&self, tenant_id: TenantId, clerk_id: UserId) -> bool {
        self.store.list(tenant_id).iter().any(|s| s.clerk_id == clerk_id)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let event: SaleEvent = decode(envelope, |e: &SaleEvent| {
            let (t, s) = e.tenant_and_sale();
            (t, s.0)
        })?;

        match event {
            SaleEvent::SaleOpened(e) => {
                self.store.upsert(
                    tenant_id,
                    e.sale_id,
                    SaleReadModel {
                        sale_id: e.sale_id,
                        invoice_number: e.invoice_number,
                        clerk_id: e.clerk_id,
                        clerk_username: e.clerk_username,
                        status: e.status,
                        lines: e.lines,
                        total: e.total,
                        total_profit: e.total_profit,
                        payment: e.payment,
                        sale_date: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            SaleEvent::SaleRevised(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.sale_id) {
                    rm.status = e.status;
                    rm.lines = e.lines;
                    rm.total = e.total;
                    rm.total_profit = e.total_profit;
                    rm.payment = e.payment;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.sale_id, rm);
                }
            }
            SaleEvent::SaleStatusChanged(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.sale_id) {
                    rm.status = e.to;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.sale_id, rm);
                }
            }
            SaleEvent::SaleDeleted(e) => {
                self.store.remove(tenant_id, &e.sale_id);
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}
