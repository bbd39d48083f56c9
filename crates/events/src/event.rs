//! Domain event contract.

use chrono::{DateTime, Utc};

/// An immutable fact emitted by an aggregate.
///
/// `event_type` is a dotted, stable name such as `"sales.sale.opened"`; it is
/// persisted next to the payload and must not change once released. Bump
/// `version` instead when the payload shape changes.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    fn occurred_at(&self) -> DateTime<Utc>;
}
