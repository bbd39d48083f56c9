//! `tillpoint-sales` — checkout pricing and the sale ledger (event-sourced).
//!
//! Pure domain logic: quoting a cart, invoice numbering, the [`Sale`] aggregate and
//! the stock plan for status changes. Stock itself lives on the product aggregates;
//! moving it is the checkout coordinator's job.

pub mod invoice;
pub mod quote;
pub mod reconcile;
pub mod sale;
pub mod status;

pub use invoice::InvoiceNumber;
pub use quote::{CartItem, ProductSnapshot, Quote, SaleLine, quote, stock_by_product, sum_lines};
pub use reconcile::{StockPlan, plan_status_change};
pub use sale::{
    ChangeSaleStatus, DeleteSale, OpenSale, Payment, ReviseSale, Sale, SaleCommand, SaleDeleted,
    SaleEvent, SaleId, SaleOpened, SaleRevised, SaleStatusChanged,
};
pub use status::{PaymentMethod, SaleStatus};
