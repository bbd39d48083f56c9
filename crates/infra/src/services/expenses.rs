//! Running costs of the shop.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use tillpoint_auth::Principal;
use tillpoint_core::{AggregateId, DomainError, TenantId};
use tillpoint_events::{EventBus, EventEnvelope};
use tillpoint_expenses::{
    DeleteExpense, Expense, ExpenseCommand, ExpenseDetails, ExpenseId, RecordExpense, UpdateExpense,
};

use super::{PosResult, Till};
use crate::event_store::EventStore;
use crate::projections::ExpenseReadModel;
use crate::projections::expenses::AGGREGATE_TYPE;

fn expense(id: AggregateId) -> Expense {
    Expense::empty(ExpenseId::new(id))
}

impl<S, B> Till<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn record_expense(
        &self,
        who: &Principal,
        details: ExpenseDetails,
        now: DateTime<Utc>,
    ) -> PosResult<ExpenseReadModel> {
        let id = AggregateId::new();
        self.execute(
            who.tenant_id,
            id,
            AGGREGATE_TYPE,
            ExpenseCommand::Record(RecordExpense {
                tenant_id: who.tenant_id,
                expense_id: ExpenseId::new(id),
                recorded_by: who.user_id,
                recorded_by_username: who.username.clone(),
                details,
                occurred_at: now,
            }),
            |_, id| expense(id),
        )?;
        self.expense(who.tenant_id, ExpenseId::new(id))
    }

    pub fn update_expense(
        &self,
        tenant_id: TenantId,
        expense_id: ExpenseId,
        details: ExpenseDetails,
        now: DateTime<Utc>,
    ) -> PosResult<ExpenseReadModel> {
        self.execute(
            tenant_id,
            expense_id.0,
            AGGREGATE_TYPE,
            ExpenseCommand::Update(UpdateExpense {
                tenant_id,
                expense_id,
                details,
                occurred_at: now,
            }),
            |_, id| expense(id),
        )?;
        self.expense(tenant_id, expense_id)
    }

    pub fn delete_expense(&self, tenant_id: TenantId, expense_id: ExpenseId, now: DateTime<Utc>) -> PosResult<()> {
        self.execute(
            tenant_id,
            expense_id.0,
            AGGREGATE_TYPE,
            ExpenseCommand::Delete(DeleteExpense {
                tenant_id,
                expense_id,
                occurred_at: now,
            }),
            |_, id| expense(id),
        )?;
        Ok(())
    }

    pub fn expense(&self, tenant_id: TenantId, expense_id: ExpenseId) -> PosResult<ExpenseReadModel> {
        self.projections
            .expenses
            .get(tenant_id, &expense_id)
            .ok_or_else(|| DomainError::not_found("expense").into())
    }
}
