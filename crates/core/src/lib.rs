//! `tillpoint-core` — shared domain building blocks for the till.
//!
//! Nothing in here knows about HTTP, storage or a specific business module.
//! Catalog, sales, expenses and users all build on these types.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId};
pub use money::Money;
