//! `tillpoint-products` — the catalog (event-sourced).
//!
//! Deterministic domain logic only: categories, SKU numbering, pack-fraction
//! pricing and stock levels, plus the [`Product`] aggregate that ties them
//! together.

pub mod category;
pub mod pricing;
pub mod product;
pub mod sku;
pub mod stock;

pub use category::Category;
pub use pricing::{MAX_PRICE, Pricing, UnitType};
pub use product::{
    AdjustStock, CreateProduct, DeleteProduct, Product, ProductCommand, ProductCreated,
    ProductDeleted, ProductDetails, ProductEvent, ProductId, ProductUpdated, StockAdjusted,
    StockChange, StockReason, UpdateProduct,
};
pub use sku::generate_sku;
pub use stock::{LOW_STOCK_PACKS, MAX_STOCK_PACKS, StockLevel, StockStatus, required_stock};
