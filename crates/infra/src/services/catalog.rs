//! Catalog maintenance: products, SKUs and shelf stock.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use tillpoint_core::{AggregateId, DomainError, Money, TenantId};
use tillpoint_events::{EventBus, EventEnvelope};
use tillpoint_products::{
    AdjustStock, Category, CreateProduct, DeleteProduct, Pricing, Product, ProductCommand,
    ProductDetails, ProductId, StockChange, StockLevel, StockReason, UpdateProduct, MAX_STOCK_PACKS,
    generate_sku,
};

use super::{PosError, PosResult, Till};
use crate::event_store::EventStore;
use crate::projections::ProductReadModel;
use crate::projections::products::AGGREGATE_TYPE;

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub details: ProductDetails,
    /// Opening stock in whole packs.
    pub packs: u64,
    /// Hand-entered code; generated from the category when absent.
    pub sku: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockUpdate {
    /// Receive `n` whole packs.
    Restock(u64),
    /// Overwrite the count after a stock take, in whole packs.
    Count(u64),
}

/// One spreadsheet-style row of a bulk import. Every cell is raw text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductRow {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub purchase_price: Option<String>,
    #[serde(default)]
    pub full_price: Option<String>,
    #[serde(default)]
    pub half_price: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BulkImportReport {
    pub added: usize,
    pub errors: Vec<String>,
}

/// Rows are numbered as in the uploaded sheet, whose first line is the header.
const FIRST_DATA_ROW: usize = 2;

fn product_id(id: AggregateId) -> ProductId {
    ProductId::new(id)
}

/// The message of a rejected rule, without the error-kind prefix.
fn reason(err: &DomainError) -> String {
    match err {
        DomainError::Validation(m) | DomainError::Conflict(m) => m.clone(),
        other => other.to_string(),
    }
}

fn shelf_packs(packs: u64) -> Result<StockLevel, DomainError> {
    if packs > MAX_STOCK_PACKS {
        return Err(DomainError::validation(format!("quantity cannot exceed {MAX_STOCK_PACKS}")));
    }
    Ok(StockLevel::from_packs(packs))
}

fn blank(cell: &Option<String>) -> Option<&str> {
    cell.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ProductRow {
    fn parse(&self) -> Result<NewProduct, String> {
        let (Some(name), Some(category), Some(purchase), Some(full)) = (
            blank(&self.name),
            blank(&self.category),
            blank(&self.purchase_price),
            blank(&self.full_price),
        ) else {
            return Err("Missing required fields (name, category, purchase_price, full_price)".into());
        };

        let category: Category = category.parse().map_err(|_| {
            let valid: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
            format!("Invalid category '{category}'. Valid options: {}", valid.join(", "))
        })?;

        let money = |raw: &str| Money::parse(raw).map_err(|e| format!("Invalid data format - {}", reason(&e)));
        let pricing = Pricing {
            purchase_price: money(purchase)?,
            full_price: money(full)?,
            half_price: blank(&self.half_price).map(money).transpose()?,
        };
        let packs = match blank(&self.quantity) {
            Some(q) => q
                .parse::<u64>()
                .map_err(|_| format!("Invalid data format - invalid quantity '{q}'"))?,
            None => 0,
        };

        Ok(NewProduct {
            details: ProductDetails {
                name: name.to_string(),
                category,
                description: blank(&self.description).unwrap_or_default().to_string(),
                pricing,
            },
            packs,
            sku: None,
        })
    }
}

impl<S, B> Till<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn create_product(
        &self,
        tenant_id: TenantId,
        input: NewProduct,
        now: DateTime<Utc>,
    ) -> PosResult<ProductReadModel> {
        self.serialized(tenant_id, || self.create_product_locked(tenant_id, input, now))
    }

    fn create_product_locked(
        &self,
        tenant_id: TenantId,
        input: NewProduct,
        now: DateTime<Utc>,
    ) -> PosResult<ProductReadModel> {
        let skus = self.projections.products.skus(tenant_id);
        let sku = match input.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(given) => {
                let given = given.to_ascii_uppercase();
                if skus.iter().any(|s| *s == given) {
                    return Err(DomainError::conflict(format!("SKU {given} is already in use")).into());
                }
                given
            }
            None => generate_sku(input.details.category, skus.iter().map(String::as_str)),
        };

        let id = AggregateId::new();
        let pid = product_id(id);
        self.execute(
            tenant_id,
            id,
            AGGREGATE_TYPE,
            ProductCommand::Create(CreateProduct {
                tenant_id,
                product_id: pid,
                sku,
                details: input.details,
                initial_packs: input.packs,
                occurred_at: now,
            }),
            |_, id| Product::empty(product_id(id)),
        )?;
        self.read_product(tenant_id, pid)
    }

    /// Edit a product. A new category gets a fresh SKU under the new prefix;
    /// `packs`, when given, overwrites the shelf count.
    pub fn update_product(
        &self,
        tenant_id: TenantId,
        pid: ProductId,
        details: ProductDetails,
        packs: Option<u64>,
        now: DateTime<Utc>,
    ) -> PosResult<ProductReadModel> {
        let target = packs.map(shelf_packs).transpose()?;
        self.serialized(tenant_id, || {
            let current: Product = self.load(tenant_id, pid.0, |_, id| Product::empty(product_id(id)))?;
            let Some(previous) = current.details().filter(|_| current.is_live()).cloned() else {
                return Err(DomainError::not_found("product").into());
            };
            let category_changed = previous.category != details.category;
            let new_sku = if category_changed {
                let skus = self.projections.products.skus(tenant_id);
                Some(generate_sku(details.category, skus.iter().map(String::as_str)))
            } else {
                None
            };

            self.execute(
                tenant_id,
                pid.0,
                AGGREGATE_TYPE,
                ProductCommand::Update(UpdateProduct {
                    tenant_id,
                    product_id: pid,
                    details,
                    new_sku,
                    occurred_at: now,
                }),
                |_, id| Product::empty(product_id(id)),
            )?;
            if let Some(level) = target {
                if let Err(err) = self.move_stock(tenant_id, pid, StockChange::SetTo(level), StockReason::Correction, now) {
                    let restored = self.execute(
                        tenant_id,
                        pid.0,
                        AGGREGATE_TYPE,
                        ProductCommand::Update(UpdateProduct {
                            tenant_id,
                            product_id: pid,
                            details: previous,
                            new_sku: category_changed.then(|| current.sku().to_string()),
                            occurred_at: now,
                        }),
                        |_, id| Product::empty(product_id(id)),
                    );
                    if let Err(undo) = restored {
                        error!(%tenant_id, product_id = %pid, error = %undo, "could not undo product edit");
                        return Err(PosError::Compensation(format!(
                            "product {pid} was edited but its stock was not set: {err}"
                        )));
                    }
                    return Err(err);
                }
            }
            self.read_product(tenant_id, pid)
        })
    }

    pub fn update_stock(
        &self,
        tenant_id: TenantId,
        pid: ProductId,
        update: StockUpdate,
        now: DateTime<Utc>,
    ) -> PosResult<ProductReadModel> {
        let (change, reason) = match update {
            StockUpdate::Restock(packs) => (StockChange::Add(shelf_packs(packs)?), StockReason::Restock),
            StockUpdate::Count(packs) => (StockChange::SetTo(shelf_packs(packs)?), StockReason::Correction),
        };
        self.serialized(tenant_id, || {
            self.move_stock(tenant_id, pid, change, reason, now)?;
            self.read_product(tenant_id, pid)
        })
    }

    /// Remove a product that was never sold. Sold products stay for the sales history.
    pub fn delete_product(&self, tenant_id: TenantId, pid: ProductId, now: DateTime<Utc>) -> PosResult<()> {
        self.serialized(tenant_id, || {
            if self.projections.sales.references_product(tenant_id, pid) {
                return Err(DomainError::conflict("Cannot delete product with existing sales history.").into());
            }
            self.execute(
                tenant_id,
                pid.0,
                AGGREGATE_TYPE,
                ProductCommand::Delete(DeleteProduct {
                    tenant_id,
                    product_id: pid,
                    occurred_at: now,
                }),
                |_, id| Product::empty(product_id(id)),
            )?;
            info!(%tenant_id, product_id = %pid, "product deleted");
            Ok(())
        })
    }

    /// Create a product per valid row. Bad rows are reported and skipped.
    pub fn bulk_add_products(
        &self,
        tenant_id: TenantId,
        rows: &[ProductRow],
        now: DateTime<Utc>,
    ) -> PosResult<BulkImportReport> {
        self.serialized(tenant_id, || {
            let mut report = BulkImportReport::default();
            for (idx, row) in rows.iter().enumerate() {
                let row_num = idx + FIRST_DATA_ROW;
                let created = row
                    .parse()
                    .and_then(|input| {
                        self.create_product_locked(tenant_id, input, now)
                            .map_err(|e| match e {
                                PosError::Domain(d) => reason(&d),
                                other => other.to_string(),
                            })
                    });
                match created {
                    Ok(_) => report.added += 1,
                    Err(msg) => report.errors.push(format!("Row {row_num}: {msg}")),
                }
            }
            info!(
                %tenant_id,
                added = report.added,
                rejected = report.errors.len(),
                "bulk product import"
            );
            Ok(report)
        })
    }

    pub(crate) fn move_stock(
        &self,
        tenant_id: TenantId,
        pid: ProductId,
        change: StockChange,
        reason: StockReason,
        now: DateTime<Utc>,
    ) -> PosResult<()> {
        self.execute(
            tenant_id,
            pid.0,
            AGGREGATE_TYPE,
            ProductCommand::AdjustStock(AdjustStock {
                tenant_id,
                product_id: pid,
                change,
                reason,
                occurred_at: now,
            }),
            |_, id| Product::empty(product_id(id)),
        )?;
        Ok(())
    }

    fn read_product(&self, tenant_id: TenantId, pid: ProductId) -> PosResult<ProductReadModel> {
        self.projections
            .products
            .get(tenant_id, &pid)
            .ok_or_else(|| DomainError::not_found("product").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{stock_product, till};

    fn row(name: &str, category: &str, purchase: &str, full: &str, qty: &str) -> ProductRow {
        ProductRow {
            name: Some(name.into()),
            category: Some(category.into()),
            purchase_price: Some(purchase.into()),
            full_price: Some(full.into()),
            quantity: Some(qty.into()),
            ..ProductRow::default()
        }
    }

    #[test]
    fn skus_are_generated_per_category() {
        let till = till();
        let t = TenantId::new();
        let a = stock_product(&till, t, "Rice", 10, 8, 5);
        let b = stock_product(&till, t, "Beans", 10, 8, 5);

        let products = till.projections().products.list(t);
        let sku_of = |pid| products.iter().find(|p| p.product_id == pid).unwrap().sku.clone();
        assert_eq!(sku_of(a), "FOO0001");
        assert_eq!(sku_of(b), "FOO0002");
    }

    #[test]
    fn duplicate_hand_entered_sku_is_a_conflict() {
        let till = till();
        let t = TenantId::new();
        stock_product(&till, t, "Rice", 10, 8, 5);
        let existing = till.projections().products.list(t)[0].clone();

        let err = till
            .create_product(
                t,
                NewProduct {
                    details: ProductDetails {
                        name: "Other rice".into(),
                        ..existing_details(&existing)
                    },
                    packs: 0,
                    sku: Some("foo0001".into()),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, PosError::Domain(DomainError::Conflict(_))));
    }

    fn existing_details(p: &ProductReadModel) -> ProductDetails {
        ProductDetails {
            name: p.name.clone(),
            category: p.category,
            description: p.description.clone(),
            pricing: p.pricing,
        }
    }

    #[test]
    fn changing_category_moves_the_sku_to_the_new_prefix() {
        let till = till();
        let t = TenantId::new();
        let pid = stock_product(&till, t, "Cable", 10, 8, 5);
        let current = till.projections().products.get(t, &pid).unwrap();

        let updated = till
            .update_product(
                t,
                pid,
                ProductDetails {
                    category: Category::Electronics,
                    ..existing_details(&current)
                },
                None,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(updated.sku, "ELE0001");
        assert_eq!(updated.category, Category::Electronics);
    }

    #[test]
    fn oversized_count_rejects_the_whole_edit() {
        let till = till();
        let t = TenantId::new();
        let pid = stock_product(&till, t, "Rice", 10, 8, 5);
        let before = till.projections().products.get(t, &pid).unwrap();

        let err = till
            .update_product(
                t,
                pid,
                ProductDetails {
                    name: "Renamed".into(),
                    category: Category::Electronics,
                    ..existing_details(&before)
                },
                Some(MAX_STOCK_PACKS + 1),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, PosError::Domain(DomainError::Validation(_))));

        let after = till.projections().products.get(t, &pid).unwrap();
        assert_eq!((after.name.as_str(), after.sku.as_str()), ("Rice", "FOO0001"));
        assert_eq!(after.stock, StockLevel::from_packs(5));
    }

    #[test]
    fn stock_count_overwrites_and_restock_adds() {
        let till = till();
        let t = TenantId::new();
        let pid = stock_product(&till, t, "Soap", 5, 3, 2);

        let p = till.update_stock(t, pid, StockUpdate::Restock(3), Utc::now()).unwrap();
        assert_eq!(p.stock, StockLevel::from_packs(5));
        let p = till.update_stock(t, pid, StockUpdate::Count(1), Utc::now()).unwrap();
        assert_eq!(p.stock, StockLevel::from_packs(1));
    }

    #[test]
    fn unsold_product_can_be_deleted() {
        let till = till();
        let t = TenantId::new();
        let pid = stock_product(&till, t, "Soap", 5, 3, 2);

        till.delete_product(t, pid, Utc::now()).unwrap();
        assert!(till.projections().products.get(t, &pid).is_none());
        assert!(till.delete_product(t, pid, Utc::now()).is_err());
    }

    #[test]
    fn bulk_import_keeps_good_rows_and_numbers_bad_ones_from_two() {
        let till = till();
        let t = TenantId::new();
        let rows = vec![
            row("Milk", "food", "4.00", "5.50", "10"),
            row("Radio", "gadgets", "40", "55", "1"),
            ProductRow {
                name: Some("No price".into()),
                category: Some("food".into()),
                ..ProductRow::default()
            },
            row("Bread", "food", "1.5", "2", ""),
            row("Tape", "office", "abc", "2", "1"),
        ];

        let report = till.bulk_add_products(t, &rows, Utc::now()).unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[0].starts_with("Row 3: Invalid category 'gadgets'"));
        assert_eq!(
            report.errors[1],
            "Row 4: Missing required fields (name, category, purchase_price, full_price)"
        );
        assert!(report.errors[2].starts_with("Row 6: Invalid data format"));

        let bread = till
            .projections()
            .products
            .list(t)
            .into_iter()
            .find(|p| p.name == "Bread")
            .unwrap();
        assert_eq!(bread.stock, StockLevel::EMPTY);
        assert_eq!(bread.pricing.full_price, Money::from_minor(200));
    }
}
