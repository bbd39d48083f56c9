//! Per-stream cursors shared by the projections.
//!
//! Delivery is at-least-once, so every projection remembers the last sequence
//! number it applied for each `(tenant, aggregate)` stream and skips anything at
//! or below it.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use tillpoint_core::{AggregateId, TenantId};
use tillpoint_events::EventEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {reason}")]
    Deserialize {
        aggregate_type: String,
        reason: String,
    },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.get(&(tenant_id, aggregate_id)).copied())
            .unwrap_or(0)
    }

    /// Whether `envelope` is new for its stream.
    ///
    /// `Ok(false)` for a redelivery. A gap is an error: the projection missed an event.
    pub fn admit(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let last = self.last(envelope.tenant_id(), envelope.aggregate_id());
        let found = envelope.sequence_number();
        if found == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found });
        }
        if found <= last {
            return Ok(false);
        }
        if found != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found });
        }
        Ok(true)
    }

    pub fn advance(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Ok(mut c) = self.inner.write() {
            c.insert(
                (envelope.tenant_id(), envelope.aggregate_id()),
                envelope.sequence_number(),
            );
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut c) = self.inner.write() {
            c.retain(|(t, _), _| *t != tenant_id);
        }
    }
}

/// Decode an envelope payload and check it belongs to the envelope's tenant and stream.
pub(crate) fn decode<E>(
    envelope: &EventEnvelope<JsonValue>,
    tenant_and_id: impl FnOnce(&E) -> (TenantId, AggregateId),
) -> Result<E, ProjectionError>
where
    E: serde::de::DeserializeOwned,
{
    let event: E = serde_json::from_value(envelope.payload().clone()).map_err(|e| {
        ProjectionError::Deserialize {
            aggregate_type: envelope.aggregate_type().to_string(),
            reason: e.to_string(),
        }
    })?;
    let (tenant_id, aggregate_id) = tenant_and_id(&event);
    if tenant_id != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    if aggregate_id != envelope.aggregate_id() {
        return Err(ProjectionError::TenantIsolation(
            "event aggregate id does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(event)
}
