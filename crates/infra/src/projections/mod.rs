//! Read models built from the event stream.
//!
//! Every projection is rebuildable from the store, tenant-isolated and idempotent
//! per stream (see [`cursor::StreamCursors`]).

pub mod cursor;
pub mod expenses;
pub mod products;
pub mod sales;
pub mod users;

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use tillpoint_auth::UserId;
use tillpoint_core::TenantId;
use tillpoint_events::EventEnvelope;
use tillpoint_expenses::ExpenseId;
use tillpoint_products::ProductId;
use tillpoint_sales::SaleId;

use crate::event_store::{EventStore, EventStoreError, StoredEvent};
use crate::read_model::InMemoryTenantStore;

pub use cursor::{ProjectionError, StreamCursors};
pub use expenses::{ExpenseFilter, ExpenseReadModel, ExpensesProjection};
pub use products::{ProductCatalogProjection, ProductFilter, ProductReadModel};
pub use sales::{SaleFilter, SaleReadModel, SalesLedgerProjection};
pub use users::{UserReadModel, UsersProjection};

pub type ProductStore = Arc<InMemoryTenantStore<ProductId, ProductReadModel>>;
pub type SaleStore = Arc<InMemoryTenantStore<SaleId, SaleReadModel>>;
pub type ExpenseStore = Arc<InMemoryTenantStore<ExpenseId, ExpenseReadModel>>;
pub type UserStore = Arc<InMemoryTenantStore<UserId, UserReadModel>>;

/// All read models of the application, fed together.
#[derive(Debug)]
pub struct Projections {
    pub products: ProductCatalogProjection<ProductStore>,
    pub sales: SalesLedgerProjection<SaleStore>,
    pub expenses: ExpensesProjection<ExpenseStore>,
    pub users: UsersProjection<UserStore>,
}

impl Default for Projections {
    fn default() -> Self {
        Self::new()
    }
}

impl Projections {
    pub fn new() -> Self {
        Self {
            products: ProductCatalogProjection::new(Arc::new(InMemoryTenantStore::new())),
            sales: SalesLedgerProjection::new(Arc::new(InMemoryTenantStore::new())),
            expenses: ExpensesProjection::new(Arc::new(InMemoryTenantStore::new())),
            users: UsersProjection::new(Arc::new(InMemoryTenantStore::new())),
        }
    }

    /// Route one envelope to every projection; each ignores foreign aggregate types.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.products.apply_envelope(envelope)?;
        self.sales.apply_envelope(envelope)?;
        self.expenses.apply_envelope(envelope)?;
        self.users.apply_envelope(envelope)?;
        Ok(())
    }

    /// Apply freshly committed events. A failure is logged, not returned: the
    /// events are already durable and a rebuild will pick them up.
    pub fn apply_committed(&self, committed: &[StoredEvent]) {
        for stored in committed {
            if let Err(err) = self.apply_envelope(&stored.to_envelope()) {
                warn!(
                    event_id = %stored.event_id,
                    event_type = %stored.event_type,
                    error = %err,
                    "projection update failed"
                );
            }
        }
    }

    /// Drop a tenant's read models and replay its whole history.
    pub fn rebuild<S: EventStore>(&self, store: &S, tenant_id: TenantId) -> Result<usize, RebuildError> {
        self.products.clear_tenant(tenant_id);
        self.sales.clear_tenant(tenant_id);
        self.expenses.clear_tenant(tenant_id);
        self.users.clear_tenant(tenant_id);

        let history = store.load_tenant(tenant_id)?;
        for stored in &history {
            self.apply_envelope(&stored.to_envelope())?;
        }
        info!(%tenant_id, events = history.len(), "read models rebuilt");
        Ok(history.len())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    #[error(transparent)]
    Store(#[from] EventStoreError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[cfg(test)]
pub(crate) fn test_envelope<E: serde::Serialize>(
    aggregate_type: &str,
    aggregate_id: tillpoint_core::AggregateId,
    sequence_number: u64,
    event: &E,
) -> EventEnvelope<JsonValue> {
    EventEnvelope::new(
        uuid::Uuid::now_v7(),
        tenant_of(event),
        aggregate_id,
        aggregate_type,
        sequence_number,
        "test",
        chrono::Utc::now(),
        serde_json::to_value(event).unwrap(),
    )
}

/// Every event payload carries `tenant_id` one level below the variant tag.
#[cfg(test)]
fn tenant_of<E: serde::Serialize>(event: &E) -> TenantId {
    let value = serde_json::to_value(event).unwrap();
    let inner = value.as_object().and_then(|o| o.values().next()).unwrap();
    serde_json::from_value(inner["tenant_id"].clone()).unwrap()
}
