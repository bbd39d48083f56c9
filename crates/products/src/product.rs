//! Product aggregate: catalog entry plus stock on hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use tillpoint_events::Event;

use crate::category::Category;
use crate::pricing::Pricing;
use crate::stock::{MAX_STOCK_PACKS, StockLevel};

pub const NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const SKU_MAX_LEN: usize = 20;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Why stock moved. Kept on the event for auditing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    Sale,
    SaleReversal,
    Restock,
    Correction,
}

/// Requested stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockChange {
    Deduct(StockLevel),
    Add(StockLevel),
    SetTo(StockLevel),
}

/// Editable catalog fields shared by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub category: Category,
    pub description: String,
    pub pricing: Pricing,
}

impl ProductDetails {
    /// Trimmed copy, or the first rule it breaks.
    pub fn validated(&self) -> Result<ProductDetails, DomainError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if name.chars().count() > NAME_MAX_LEN {
            return Err(DomainError::validation(format!(
                "name cannot exceed {NAME_MAX_LEN} characters"
            )));
        }
        let description = self.description.trim();
        if description.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(DomainError::validation(format!(
                "description cannot exceed {DESCRIPTION_MAX_LEN} characters"
            )));
        }
        self.pricing.validate()?;
        Ok(ProductDetails {
            name: name.to_string(),
            category: self.category,
            description: description.to_string(),
            pricing: self.pricing,
        })
    }
}

fn validate_sku(sku: &str, category: Category) -> Result<(), DomainError> {
    if sku.is_empty() || sku.len() > SKU_MAX_LEN {
        return Err(DomainError::validation(format!(
            "sku must be 1 to {SKU_MAX_LEN} characters"
        )));
    }
    if !sku.starts_with(&category.sku_prefix()) {
        return Err(DomainError::validation(format!(
            "sku '{sku}' does not carry the {} prefix",
            category.sku_prefix()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    details: Option<ProductDetails>,
    stock: StockLevel,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Product {
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            details: None,
            stock: StockLevel::EMPTY,
            created_at: None,
            updated_at: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn details(&self) -> Option<&ProductDetails> {
        self.details.as_ref()
    }

    pub fn name(&self) -> &str {
        self.details.as_ref().map(|d| d.name.as_str()).unwrap_or("")
    }

    pub fn pricing(&self) -> Option<Pricing> {
        self.details.as_ref().map(|d| d.pricing)
    }

    pub fn stock(&self) -> StockLevel {
        self.stock
    }

    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }

    fn ensure_live(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found("product"));
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    /// Generated by the caller from the current catalog (see [`crate::generate_sku`]).
    pub sku: String,
    pub details: ProductDetails,
    /// Opening stock in whole packs.
    pub initial_packs: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    /// Required when the category changes; ignored otherwise.
    pub new_sku: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub change: StockChange,
    pub reason: StockReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProductCommand {
    Create(CreateProduct),
    Update(UpdateProduct),
    AdjustStock(AdjustStock),
    Delete(DeleteProduct),
}

// ── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub details: ProductDetails,
    pub stock: StockLevel,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    /// Signed movement in quarter packs.
    pub delta_quarters: i64,
    pub level_after: StockLevel,
    pub reason: StockReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    StockAdjusted(StockAdjusted),
    ProductDeleted(ProductDeleted),
}

impl ProductEvent {
    pub fn tenant_and_product(&self) -> (TenantId, ProductId) {
        match self {
            ProductEvent::ProductCreated(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductUpdated(e) => (e.tenant_id, e.product_id),
            ProductEvent::StockAdjusted(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductDeleted(e) => (e.tenant_id, e.product_id),
        }
    }
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::ProductUpdated(_) => "products.product.updated",
            ProductEvent::StockAdjusted(_) => "products.product.stock_adjusted",
            ProductEvent::ProductDeleted(_) => "products.product.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
        }
    }
}

// ── Aggregate ───────────────────────────────────────────────────────────────

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.details = Some(e.details.clone());
                self.stock = e.stock;
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                self.sku = e.sku.clone();
                self.details = Some(e.details.clone());
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::StockAdjusted(e) => {
                self.stock = e.level_after;
                self.updated_at = Some(e.occurred_at);
            }
            ProductEvent::ProductDeleted(e) => {
                self.deleted = true;
                self.updated_at = Some(e.occurred_at);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::Create(cmd) => self.handle_create(cmd),
            ProductCommand::Update(cmd) => self.handle_update(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            ProductCommand::Delete(cmd) => {
                self.ensure_live(cmd.tenant_id, cmd.product_id)?;
                Ok(vec![ProductEvent::ProductDeleted(ProductDeleted {
                    tenant_id: cmd.tenant_id,
                    product_id: cmd.product_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Product {
    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.product_id != self.id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        let details = cmd.details.validated()?;
        let sku = cmd.sku.trim().to_ascii_uppercase();
        validate_sku(&sku, details.category)?;
        if cmd.initial_packs > MAX_STOCK_PACKS {
            return Err(DomainError::validation(format!(
                "quantity cannot exceed {MAX_STOCK_PACKS}"
            )));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku,
            details,
            stock: StockLevel::from_packs(cmd.initial_packs),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.product_id)?;
        let details = cmd.details.validated()?;

        let category_changed = self.details.as_ref().map(|d| d.category) != Some(details.category);
        let sku = if category_changed {
            let sku = cmd
                .new_sku
                .as_deref()
                .map(|s| s.trim().to_ascii_uppercase())
                .ok_or_else(|| DomainError::validation("a new sku is required when the category changes"))?;
            validate_sku(&sku, details.category)?;
            sku
        } else {
            self.sku.clone()
        };

        if self.details.as_ref() == Some(&details) && sku == self.sku {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.product_id)?;

        let after = match cmd.change {
            StockChange::Deduct(qty) => self.stock.checked_sub(qty).ok_or_else(|| {
                DomainError::insufficient_stock(format!(
                    "Insufficient stock for {}. Available: {}",
                    self.name(),
                    self.stock.display_packs()
                ))
            })?,
            StockChange::Add(qty) => self.stock.checked_add(qty).ok_or_else(|| {
                DomainError::validation(format!("stock cannot exceed {MAX_STOCK_PACKS} packs"))
            })?,
            StockChange::SetTo(level) => {
                if level > StockLevel::MAX {
                    return Err(DomainError::validation(format!(
                        "stock cannot exceed {MAX_STOCK_PACKS} packs"
                    )));
                }
                level
            }
        };

        let delta = after.quarters() as i64 - self.stock.quarters() as i64;
        if delta == 0 {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            delta_quarters: delta,
            level_after: after,
            reason: cmd.reason,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillpoint_core::Money;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn details(category: Category) -> ProductDetails {
        ProductDetails {
            name: " Milo Tin ".into(),
            category,
            description: String::new(),
            pricing: Pricing {
                purchase_price: Money::from_minor(2_000),
                full_price: Money::from_minor(3_000),
                half_price: None,
            },
        }
    }

    fn created(packs: u64) -> (TenantId, Product) {
        let tenant_id = test_tenant_id();
        let product_id = ProductId::new(AggregateId::new());
        let mut product = Product::empty(product_id);
        product
            .execute(&ProductCommand::Create(CreateProduct {
                tenant_id,
                product_id,
                sku: "foo0001".into(),
                details: details(Category::Food),
                initial_packs: packs,
                occurred_at: test_time(),
            }))
            .unwrap();
        (tenant_id, product)
    }

    fn adjust(tenant_id: TenantId, product: &Product, change: StockChange) -> ProductCommand {
        ProductCommand::AdjustStock(AdjustStock {
            tenant_id,
            product_id: *product.id(),
            change,
            reason: StockReason::Sale,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_normalizes_name_and_sku() {
        let (_, product) = created(3);
        assert_eq!(product.name(), "Milo Tin");
        assert_eq!(product.sku(), "FOO0001");
        assert_eq!(product.stock(), StockLevel::from_packs(3));
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn create_rejects_sku_from_another_category() {
        let product_id = ProductId::new(AggregateId::new());
        let err = Product::empty(product_id)
            .handle(&ProductCommand::Create(CreateProduct {
                tenant_id: test_tenant_id(),
                product_id,
                sku: "ELE0001".into(),
                details: details(Category::Food),
                initial_packs: 0,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("FOO") => {}
            other => panic!("expected prefix validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_rejects_blank_name() {
        let product_id = ProductId::new(AggregateId::new());
        let mut d = details(Category::Food);
        d.name = "   ".into();
        let err = Product::empty(product_id)
            .handle(&ProductCommand::Create(CreateProduct {
                tenant_id: test_tenant_id(),
                product_id,
                sku: "FOO0001".into(),
                details: d,
                initial_packs: 0,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn deduct_beyond_stock_reports_available_packs() {
        let (tenant_id, mut product) = created(1);
        product
            .execute(&adjust(tenant_id, &product, StockChange::Deduct(StockLevel::from_quarters(2))))
            .unwrap();

        let err = product
            .handle(&adjust(tenant_id, &product, StockChange::Deduct(StockLevel::from_packs(1))))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock("Insufficient stock for Milo Tin. Available: 0.5".into())
        );
    }

    #[test]
    fn adjust_records_signed_delta_and_level() {
        let (tenant_id, product) = created(2);
        let events = product
            .handle(&adjust(tenant_id, &product, StockChange::Deduct(StockLevel::from_quarters(3))))
            .unwrap();
        match &events[0] {
            ProductEvent::StockAdjusted(e) => {
                assert_eq!(e.delta_quarters, -3);
                assert_eq!(e.level_after.quarters(), 5);
            }
            other => panic!("expected StockAdjusted, got {other:?}"),
        }
    }

    #[test]
    fn setting_stock_to_current_level_emits_nothing() {
        let (tenant_id, product) = created(2);
        let events = product
            .handle(&adjust(tenant_id, &product, StockChange::SetTo(StockLevel::from_packs(2))))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn category_change_requires_matching_new_sku() {
        let (tenant_id, mut product) = created(0);
        let update = |new_sku: Option<&str>| {
            ProductCommand::Update(UpdateProduct {
                tenant_id,
                product_id: *product.id(),
                details: details(Category::Health),
                new_sku: new_sku.map(str::to_string),
                occurred_at: test_time(),
            })
        };

        assert!(product.handle(&update(None)).is_err());
        assert!(product.handle(&update(Some("FOO0002"))).is_err());

        let cmd = update(Some("HEA0001"));
        product.execute(&cmd).unwrap();
        assert_eq!(product.sku(), "HEA0001");
    }

    #[test]
    fn same_category_update_keeps_sku() {
        let (tenant_id, mut product) = created(0);
        let mut d = details(Category::Food);
        d.name = "Milo Refill".into();
        product
            .execute(&ProductCommand::Update(UpdateProduct {
                tenant_id,
                product_id: *product.id(),
                details: d,
                new_sku: Some("FOO9999".into()),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(product.sku(), "FOO0001");
        assert_eq!(product.name(), "Milo Refill");
    }

    #[test]
    fn deleted_product_rejects_commands() {
        let (tenant_id, mut product) = created(4);
        product
            .execute(&ProductCommand::Delete(DeleteProduct {
                tenant_id,
                product_id: *product.id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        let err = product
            .handle(&adjust(tenant_id, &product, StockChange::Add(StockLevel::from_packs(1))))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("product"));
    }

    #[test]
    fn other_tenant_is_refused() {
        let (_, product) = created(4);
        let err = product
            .handle(&adjust(TenantId::new(), &product, StockChange::Add(StockLevel::from_packs(1))))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 500, ..ProptestConfig::default() })]

            /// Whatever mix of deductions and restocks is accepted, the level never
            /// goes negative and always equals opening stock plus the accepted deltas.
            #[test]
            fn stock_is_conserved(
                opening in 0u64..50,
                moves in prop::collection::vec((any::<bool>(), 1u64..40), 0..30)
            ) {
                let (tenant_id, mut product) = created(opening);
                let mut expected = (opening * 4) as i64;

                for (deduct, quarters) in moves {
                    let qty = StockLevel::from_quarters(quarters);
                    let change = if deduct { StockChange::Deduct(qty) } else { StockChange::Add(qty) };
                    if let Ok(events) = product.execute(&adjust(tenant_id, &product, change)) {
                        for e in events {
                            if let ProductEvent::StockAdjusted(e) = e {
                                expected += e.delta_quarters;
                            }
                        }
                    }
                    prop_assert!(expected >= 0);
                    prop_assert_eq!(product.stock().quarters() as i64, expected);
                }
            }
        }
    }
}
