//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! load stream -> rehydrate -> handle -> append (exact version) -> publish
//! ```
//!
//! Publication happens only after the append succeeded. A publish failure is
//! reported, but the events are already stored.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use tillpoint_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use tillpoint_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The aggregate rejected the command.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Stream moved on between load and append.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// A stored payload no longer matches the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// Stored, but not delivered to the bus.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate without running a command.
    ///
    /// A stream that was never written yields the fresh instance from `make_aggregate`.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Run `command` against the aggregate's current state and persist the outcome.
    ///
    /// Returns the committed events; empty when the command was a no-op.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: tillpoint_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        debug!(
            %tenant_id,
            %aggregate_id,
            aggregate_type = %aggregate_type,
            events = committed.len(),
            "command committed"
        );

        for stored in &committed {
            self.bus.publish(stored.to_envelope()).map_err(|e| {
                warn!(event_id = %stored.event_id, error = ?e, "publish failed after append");
                DispatchError::Publish(format!("{e:?}"))
            })?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "gap in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tillpoint_core::{AggregateRoot, Money};
    use tillpoint_events::InMemoryEventBus;
    use tillpoint_products::{
        Category, CreateProduct, Pricing, Product, ProductCommand, ProductDetails, ProductId,
    };

    use crate::event_store::InMemoryEventStore;

    type Dispatcher = CommandDispatcher<InMemoryEventStore, InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(InMemoryEventStore::new(), InMemoryEventBus::new())
    }

    fn create(tenant_id: TenantId, id: AggregateId, sku: &str) -> ProductCommand {
        ProductCommand::Create(CreateProduct {
            tenant_id,
            product_id: ProductId::new(id),
            sku: sku.into(),
            details: ProductDetails {
                name: "Gari".into(),
                category: Category::Food,
                description: String::new(),
                pricing: Pricing {
                    purchase_price: Money::from_minor(500),
                    full_price: Money::from_minor(800),
                    half_price: None,
                },
            },
            initial_packs: 10,
            occurred_at: Utc::now(),
        })
    }

    fn make(_: TenantId, id: AggregateId) -> Product {
        Product::empty(ProductId::new(id))
    }

    #[test]
    fn dispatch_persists_and_publishes() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let (t, id) = (TenantId::new(), AggregateId::new());

        let committed = d
            .dispatch(t, id, "products.product", create(t, id, "FOO0001"), make)
            .unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].event_type, "products.product.created");

        let envelope = sub.try_recv().unwrap();
        assert_eq!(envelope.sequence_number(), 1);

        let product: Product = d.load(t, id, make).unwrap();
        assert_eq!(product.version(), 1);
        assert_eq!(product.sku(), "FOO0001");
    }

    #[test]
    fn domain_rejection_stores_nothing() {
        let d = dispatcher();
        let (t, id) = (TenantId::new(), AggregateId::new());
        let err = d
            .dispatch(t, id, "products.product", create(t, id, "ELE0001"), make)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Domain(DomainError::Validation(_))));
        assert!(d.store().load_stream(t, id).unwrap().is_empty());
    }

    #[test]
    fn second_create_conflicts() {
        let d = dispatcher();
        let (t, id) = (TenantId::new(), AggregateId::new());
        d.dispatch(t, id, "products.product", create(t, id, "FOO0001"), make)
            .unwrap();
        let err = d
            .dispatch(t, id, "products.product", create(t, id, "FOO0002"), make)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Domain(DomainError::Conflict(_))));
    }
}
