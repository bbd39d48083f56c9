use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tillpoint_auth::{Role, UserId};
use tillpoint_core::{DomainError, DomainResult, Money};
use tillpoint_expenses::{ExpenseCategory, ExpenseDetails};
use tillpoint_infra::projections::{ProductReadModel, UserReadModel};
use tillpoint_infra::services::{CartRequestItem, ProductRow, StockUpdate};
use tillpoint_products::{Category, Pricing, ProductDetails, ProductId, StockStatus, UnitType};
use tillpoint_sales::{PaymentMethod, SaleId, SaleStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    pub role: Role,
}

/// Prices are decimal strings (`"12.50"`), as typed at the counter.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    pub purchase_price: String,
    pub full_price: String,
    pub half_price: Option<String>,
    /// Whole packs on the shelf.
    pub quantity: Option<u64>,
    pub sku: Option<String>,
}

impl ProductRequest {
    pub fn details(&self) -> DomainResult<ProductDetails> {
        Ok(ProductDetails {
            name: self.name.clone(),
            category: self.category,
            description: self.description.clone(),
            pricing: Pricing {
                purchase_price: Money::parse(&self.purchase_price)?,
                full_price: Money::parse(&self.full_price)?,
                half_price: parse_optional_money(self.half_price.as_deref())?,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum StockRequest {
    /// Add packs to what is on the shelf.
    Restock { quantity: u64 },
    /// Replace the shelf count after a stock take.
    Count { quantity: u64 },
}

impl From<StockRequest> for StockUpdate {
    fn from(value: StockRequest) -> Self {
        match value {
            StockRequest::Restock { quantity } => StockUpdate::Restock(quantity),
            StockRequest::Count { quantity } => StockUpdate::Count(quantity),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkProductsRequest {
    pub rows: Vec<ProductRow>,
}

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub product_id: ProductId,
    pub quantity: u64,
    #[serde(default)]
    pub unit_type: UnitType,
}

impl From<CartItemRequest> for CartRequestItem {
    fn from(value: CartItemRequest) -> Self {
        CartRequestItem {
            product_id: value.product_id,
            quantity: value.quantity,
            unit_type: value.unit_type,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub items: Vec<CartItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub items: Vec<CartItemRequest>,
    #[serde(default)]
    pub status: SaleStatus,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Omitted means the customer paid the exact total.
    pub amount_paid: Option<String>,
    pub continue_sale_id: Option<SaleId>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: SaleStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub sale_ids: Vec<SaleId>,
}

#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: String,
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
}

impl ExpenseRequest {
    pub fn details(self, today: NaiveDate) -> DomainResult<ExpenseDetails> {
        Ok(ExpenseDetails {
            category: self.category,
            description: self.description,
            amount: Money::parse(&self.amount)?,
            date: self.date.unwrap_or(today),
            receipt_number: self.receipt_number,
            notes: self.notes,
        })
    }
}

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub q: Option<String>,
    pub category: Option<Category>,
    pub page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub category: Option<Category>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    pub status: Option<SaleStatus>,
    pub page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub clerk_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpensesQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: Option<ExpenseCategory>,
}

// -------------------------
// Responses
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub user: UserReadModel,
}

/// A catalog row with its stock badge.
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: ProductReadModel,
    pub status: StockStatus,
    pub packs: String,
}

impl From<ProductReadModel> for ProductView {
    fn from(product: ProductReadModel) -> Self {
        Self {
            status: product.status(),
            packs: product.stock.display_packs(),
            product,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TemporaryPasswordResponse {
    pub user_id: UserId,
    pub temporary_password: String,
}

pub fn parse_optional_money(raw: Option<&str>) -> DomainResult<Option<Money>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Money::parse(s).map(Some),
    }
}

pub fn passwords_match(req: &ChangePasswordRequest) -> DomainResult<()> {
    match &req.confirm_password {
        Some(confirm) if *confirm != req.new_password => {
            Err(DomainError::validation("New passwords do not match"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_request_parses_decimal_prices() {
        let req: ProductRequest = serde_json::from_value(serde_json::json!({
            "name": "Rice 5kg",
            "category": "food",
            "purchase_price": "45.00",
            "full_price": "60",
            "half_price": "",
            "quantity": 10
        }))
        .unwrap();
        let details = req.details().unwrap();
        assert_eq!(details.pricing.full_price, Money::from_minor(6_000));
        assert_eq!(details.pricing.half_price, None);
        assert_eq!(req.quantity, Some(10));
    }

    #[test]
    fn stock_request_is_tagged_by_action() {
        let req: StockRequest = serde_json::from_str(r#"{"action":"count","quantity":4}"#).unwrap();
        assert!(matches!(StockUpdate::from(req), StockUpdate::Count(4)));
        assert!(serde_json::from_str::<StockRequest>(r#"{"action":"steal","quantity":4}"#).is_err());
    }

    #[test]
    fn checkout_body_defaults() {
        let body: CheckoutBody = serde_json::from_value(serde_json::json!({
            "items": [{"product_id": ProductId(tillpoint_core::AggregateId::new()), "quantity": 2}]
        }))
        .unwrap();
        assert_eq!(body.status, SaleStatus::Completed);
        assert_eq!(body.payment_method, PaymentMethod::Cash);
        assert_eq!(body.items[0].unit_type, UnitType::Full);
        assert!(body.amount_paid.is_none());
    }

    #[test]
    fn confirmation_must_match() {
        let req = ChangePasswordRequest {
            current_password: "old".into(),
            new_password: "new-secret".into(),
            confirm_password: Some("other".into()),
        };
        assert!(passwords_match(&req).is_err());
    }
}
