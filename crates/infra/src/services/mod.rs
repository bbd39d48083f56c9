//! Write-side services: everything that turns a request into commands.
//!
//! [`Till`] owns the dispatcher and the read models. Each write goes through
//! [`Till::execute`], which dispatches the command and then feeds the committed
//! events to the projections, so a read issued right after a write sees it.
//!
//! Flows that touch several aggregates (checkout, status changes, product
//! deletion) run under a per-tenant lock so two tills cannot sell the same
//! last pack. A second, inner per-tenant lock covers each dispatch together
//! with its projection update, so read models see a tenant's events in the
//! order they were appended even for writes outside those flows.

pub mod accounts;
pub mod catalog;
pub mod expenses;
pub mod pos;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use tillpoint_core::{Aggregate, AggregateId, DomainError, TenantId};
use tillpoint_events::{Event, EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::Projections;

pub use accounts::{NewUser, UserChanges};
pub use catalog::{BulkImportReport, NewProduct, ProductRow, StockUpdate};
pub use pos::{CartRequestItem, CheckoutOutcome, CheckoutRequest, PendingCartLine, SALES_PAGE_SIZE};

#[derive(Debug, Error)]
pub enum PosError {
    /// A business rule said no; safe to show to the user.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage, concurrency or publication trouble.
    #[error(transparent)]
    Dispatch(DispatchError),

    /// A multi-step flow failed and could not be fully undone.
    #[error("compensation incomplete: {0}")]
    Compensation(String),
}

impl From<DispatchError> for PosError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(e) => PosError::Domain(e),
            other => PosError::Dispatch(other),
        }
    }
}

pub type PosResult<T> = Result<T, PosError>;

#[derive(Debug, Default)]
struct TenantLocks {
    locks: Mutex<HashMap<TenantId, Arc<Mutex<()>>>>,
}

impl TenantLocks {
    fn for_tenant(&self, tenant_id: TenantId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(tenant_id).or_default().clone()
    }
}

#[derive(Debug)]
pub struct Till<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    projections: Arc<Projections>,
    locks: TenantLocks,
    /// Held across append + projection; always taken after `locks`, never before.
    commits: TenantLocks,
}

impl<S, B> Till<S, B> {
    pub fn new(dispatcher: CommandDispatcher<S, B>, projections: Arc<Projections>) -> Self {
        Self {
            dispatcher,
            projections,
            locks: TenantLocks::default(),
            commits: TenantLocks::default(),
        }
    }

    pub fn projections(&self) -> &Projections {
        &self.projections
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    /// Run `f` while holding the tenant's write lock.
    pub(crate) fn serialized<T>(&self, tenant_id: TenantId, f: impl FnOnce() -> PosResult<T>) -> PosResult<T> {
        let lock = self.locks.for_tenant(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

impl<S, B> Till<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch one command and bring the read models up to date.
    pub fn execute<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> PosResult<Vec<StoredEvent>>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let lock = self.commits.for_tenant(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let committed = self
            .dispatcher
            .dispatch(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)?;
        self.projections.apply_committed(&committed);
        Ok(committed)
    }

    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> PosResult<A>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        Ok(self.dispatcher.load(tenant_id, aggregate_id, make_aggregate)?)
    }

    /// Rebuild every read model of `tenant_id` from the store.
    pub fn rebuild(&self, tenant_id: TenantId) -> Result<usize, crate::projections::RebuildError> {
        let lock = self.commits.for_tenant(tenant_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.projections.rebuild(self.dispatcher.store(), tenant_id)
    }
}
