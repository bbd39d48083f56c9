use std::collections::HashMap;
use std::sync::RwLock;

use tillpoint_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

impl StreamKey {
    fn of(e: &StoredEvent) -> Self {
        Self {
            tenant_id: e.tenant_id,
            aggregate_id: e.aggregate_id,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamKey, Vec<StoredEvent>>,
    /// Every committed event in append order.
    log: Vec<StoredEvent>,
}

impl Inner {
    fn push(&mut self, e: StoredEvent) {
        self.streams.entry(StreamKey::of(&e)).or_default().push(e.clone());
        self.log.push(e);
    }
}

/// In-memory append-only event store.
///
/// Also the index behind [`super::JournalEventStore`], which stages a batch here,
/// writes it to disk, then commits it.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

fn poisoned() -> EventStoreError {
    EventStoreError::InvalidAppend("lock poisoned".to_string())
}

fn stage_in(
    inner: &Inner,
    events: Vec<UncommittedEvent>,
    expected_version: ExpectedVersion,
) -> Result<Vec<StoredEvent>, EventStoreError> {
    let Some(first) = events.first() else {
        return Ok(vec![]);
    };

    let key = StreamKey {
        tenant_id: first.tenant_id,
        aggregate_id: first.aggregate_id,
    };
    let aggregate_type = first.aggregate_type.clone();

    for (idx, e) in events.iter().enumerate() {
        if e.tenant_id != key.tenant_id {
            return Err(EventStoreError::TenantIsolation(format!(
                "batch contains multiple tenant_ids (index {idx})"
            )));
        }
        if e.aggregate_id != key.aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "batch contains multiple aggregate_ids (index {idx})"
            )));
        }
        if e.aggregate_type != aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "batch contains multiple aggregate_types (index {idx})"
            )));
        }
    }

    let stream = inner.streams.get(&key).map(Vec::as_slice).unwrap_or_default();
    let current = stream.last().map(|e| e.sequence_number).unwrap_or(0);
    if !expected_version.matches(current) {
        return Err(EventStoreError::Concurrency(format!(
            "expected {expected_version:?}, found {current}"
        )));
    }
    if let Some(existing) = stream.first() {
        if existing.aggregate_type != aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "stream aggregate_type is '{}', attempted append with '{}'",
                existing.aggregate_type, aggregate_type
            )));
        }
    }

    Ok(events
        .into_iter()
        .zip(current + 1..)
        .map(|(e, sequence_number)| StoredEvent {
            event_id: e.event_id,
            tenant_id: e.tenant_id,
            aggregate_id: e.aggregate_id,
            aggregate_type: e.aggregate_type,
            sequence_number,
            event_type: e.event_type,
            event_version: e.event_version,
            occurred_at: e.occurred_at,
            payload: e.payload,
        })
        .collect())
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and number a batch against the current stream head without storing it.
    pub(crate) fn stage(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        stage_in(&inner, events, expected_version)
    }

    /// Store an already numbered batch. Each event must extend its stream by one.
    pub(crate) fn commit(&self, staged: &[StoredEvent]) -> Result<(), EventStoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        for e in staged {
            let head = inner
                .streams
                .get(&StreamKey::of(e))
                .and_then(|s| s.last())
                .map(|s| s.sequence_number)
                .unwrap_or(0);
            if e.sequence_number != head + 1 {
                return Err(EventStoreError::Concurrency(format!(
                    "stream moved on while committing (head {head}, event {})",
                    e.sequence_number
                )));
            }
            inner.push(e.clone());
        }
        Ok(())
    }

    pub fn event_count(&self) -> usize {
        self.inner.read().map(|i| i.log.len()).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let staged = stage_in(&inner, events, expected_version)?;
        for e in &staged {
            inner.push(e.clone());
        }
        Ok(staged)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .streams
            .get(&StreamKey {
                tenant_id,
                aggregate_id,
            })
            .cloned()
            .unwrap_or_default())
    }

    fn load_tenant(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .log
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, n: u32) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: "test.thing".into(),
            event_type: "test.thing.happened".into(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({ "n": n }),
        }
    }

    #[test]
    fn append_numbers_from_one() {
        let store = InMemoryEventStore::new();
        let (t, a) = (TenantId::new(), AggregateId::new());
        let stored = store
            .append(vec![event(t, a, 1), event(t, a, 2)], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(stored.iter().map(|e| e.sequence_number).collect::<Vec<_>>(), [1, 2]);

        let more = store.append(vec![event(t, a, 3)], ExpectedVersion::Exact(2)).unwrap();
        assert_eq!(more[0].sequence_number, 3);
        assert_eq!(store.load_stream(t, a).unwrap().len(), 3);
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let (t, a) = (TenantId::new(), AggregateId::new());
        store.append(vec![event(t, a, 1)], ExpectedVersion::Exact(0)).unwrap();
        let err = store.append(vec![event(t, a, 2)], ExpectedVersion::Exact(0)).unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn mixed_tenant_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let err = store
            .append(
                vec![event(TenantId::new(), a, 1), event(TenantId::new(), a, 2)],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
    }

    #[test]
    fn streams_are_tenant_scoped() {
        let store = InMemoryEventStore::new();
        let (t1, t2, a) = (TenantId::new(), TenantId::new(), AggregateId::new());
        store.append(vec![event(t1, a, 1)], ExpectedVersion::Any).unwrap();
        assert!(store.load_stream(t2, a).unwrap().is_empty());
        assert!(store.load_tenant(t2).unwrap().is_empty());
        assert_eq!(store.load_tenant(t1).unwrap().len(), 1);
    }

    #[test]
    fn load_tenant_keeps_append_order_across_streams() {
        let store = InMemoryEventStore::new();
        let t = TenantId::new();
        let (a, b) = (AggregateId::new(), AggregateId::new());
        store.append(vec![event(t, a, 1)], ExpectedVersion::Any).unwrap();
        store.append(vec![event(t, b, 2)], ExpectedVersion::Any).unwrap();
        store.append(vec![event(t, a, 3)], ExpectedVersion::Any).unwrap();
        let ns: Vec<_> = store
            .load_tenant(t)
            .unwrap()
            .iter()
            .map(|e| e.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(ns, [1, 2, 3]);
    }

    #[test]
    fn staged_batch_is_invisible_until_committed() {
        let store = InMemoryEventStore::new();
        let (t, a) = (TenantId::new(), AggregateId::new());
        let staged = store.stage(vec![event(t, a, 1)], ExpectedVersion::Exact(0)).unwrap();
        assert!(store.load_stream(t, a).unwrap().is_empty());
        store.commit(&staged).unwrap();
        assert_eq!(store.load_stream(t, a).unwrap().len(), 1);
        assert!(store.commit(&staged).is_err());
    }
}
