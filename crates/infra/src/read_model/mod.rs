//! Tenant-isolated read model storage.

pub mod page;
pub mod tenant_store;

pub use page::Page;
pub use tenant_store::{InMemoryTenantStore, TenantStore};
