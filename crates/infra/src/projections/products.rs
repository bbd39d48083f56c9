//! Product catalog read model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use tillpoint_core::{Money, TenantId};
use tillpoint_events::EventEnvelope;
use tillpoint_products::{
    Category, Pricing, ProductEvent, ProductId, StockLevel, StockStatus, UnitType,
};

use super::cursor::{ProjectionError, StreamCursors, decode};
use crate::read_model::TenantStore;

pub const AGGREGATE_TYPE: &str = "products.product";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: Category,
    pub description: String,
    pub pricing: Pricing,
    pub stock: StockLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductReadModel {
    pub fn status(&self) -> StockStatus {
        self.stock.status()
    }

    pub fn price_for(&self, unit: UnitType) -> Money {
        self.pricing.price_for(unit)
    }

    /// Purchase value of the stock on hand, counting opened packs pro rata.
    pub fn stock_value(&self) -> Money {
        value_of(self.pricing.purchase_price, self.stock)
    }

    pub fn retail_value(&self) -> Money {
        value_of(self.pricing.full_price, self.stock)
    }

    fn matches(&self, needle: &str, include_description: bool) -> bool {
        let hit = |s: &str| s.to_lowercase().contains(needle);
        hit(&self.name) || hit(&self.sku) || (include_description && hit(&self.description))
    }
}

fn value_of(per_pack: Money, stock: StockLevel) -> Money {
    per_pack
        .times(stock.quarters())
        .map(|m| m.split(4))
        .unwrap_or(Money::from_minor(u64::MAX))
}

/// Filter for catalog listings. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub query: Option<String>,
    pub category: Option<Category>,
    /// Also search the description (the management listing does, the POS search does not).
    pub search_description: bool,
}

#[derive(Debug)]
pub struct ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(tenant_id, product_id)
    }

    /// All live products, sorted by name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        let mut all = self.store.list(tenant_id);
        all.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.sku.cmp(&b.sku))
        });
        all
    }

    pub fn search(&self, tenant_id: TenantId, filter: &ProductFilter) -> Vec<ProductReadModel> {
        let needle = filter
            .query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        self.list(tenant_id)
            .into_iter()
            .filter(|p| filter.category.is_none_or(|c| p.category == c))
            .filter(|p| {
                needle
                    .as_deref()
                    .is_none_or(|n| p.matches(n, filter.search_description))
            })
            .collect()
    }

    /// SKUs currently in use, for numbering a new product.
    pub fn skus(&self, tenant_id: TenantId) -> Vec<String> {
        self.store.list(tenant_id).into_iter().map(|p| p.sku).collect()
    }

    /// Low-stock products (out of stock included), emptiest first.
    pub fn low_stock(&self, tenant_id: TenantId, limit: usize) -> Vec<ProductReadModel> {
        let mut low: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|p| p.stock.is_low())
            .collect();
        low.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        low.truncate(limit);
        low
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let event: ProductEvent = decode(envelope, |e: &ProductEvent| {
            let (t, p) = e.tenant_and_product();
            (t, p.0)
        })?;

        match event {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        sku: e.sku,
                        name: e.details.name,
                        category: e.details.category,
                        description: e.details.description,
                        pricing: e.details.pricing,
                        stock: e.stock,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            ProductEvent::ProductUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.product_id) {
                    rm.sku = e.sku;
                    rm.name = e.details.name;
                    rm.category = e.details.category;
                    rm.description = e.details.description;
                    rm.pricing = e.details.pricing;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.product_id, rm);
                }
            }
            ProductEvent::StockAdjusted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.product_id) {
                    rm.stock = e.level_after;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.product_id, rm);
                }
            }
            ProductEvent::ProductDeleted(e) => {
                self.store.remove(tenant_id, &e.product_id);
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
