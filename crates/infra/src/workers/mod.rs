//! Background workers that subscribe to the event bus.

pub mod audit_log;

pub use audit_log::{AuditLogWorker, WorkerHandle};
