//! Expense ledger read model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use tillpoint_auth::UserId;
use tillpoint_core::{Money, TenantId};
use tillpoint_events::EventEnvelope;
use tillpoint_expenses::{ExpenseCategory, ExpenseEvent, ExpenseId};

use super::cursor::{ProjectionError, StreamCursors, decode};
use crate::read_model::TenantStore;

pub const AGGREGATE_TYPE: &str = "expenses.expense";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseReadModel {
    pub expense_id: ExpenseId,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: Money,
    pub date: NaiveDate,
    pub recorded_by: UserId,
    pub recorded_by_username: String,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inclusive date range plus optional category.
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<ExpenseCategory>,
}

#[derive(Debug)]
pub struct ExpensesProjection<S>
where
    S: TenantStore<ExpenseId, ExpenseReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ExpensesProjection<S>
where
    S: TenantStore<ExpenseId, ExpenseReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, expense_id: &ExpenseId) -> Option<ExpenseReadModel> {
        self.store.get(tenant_id, expense_id)
    }

    /// Matching expenses, latest date first.
    pub fn list(&self, tenant_id: TenantId, filter: &ExpenseFilter) -> Vec<ExpenseReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|e| filter.from.is_none_or(|f| e.date >= f))
            .filter(|e| filter.to.is_none_or(|t| e.date <= t))
            .filter(|e| filter.category.is_none_or(|c| e.category == c))
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.created_at.cmp(&a.created_at)));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let event: ExpenseEvent = decode(envelope, |e: &ExpenseEvent| {
            let (t, x) = e.tenant_and_expense();
            (t, x.0)
        })?;

        match event {
            ExpenseEvent::ExpenseRecorded(e) => {
                let d = e.details;
                self.store.upsert(
                    tenant_id,
                    e.expense_id,
                    ExpenseReadModel {
                        expense_id: e.expense_id,
                        category: d.category,
                        description: d.description,
                        amount: d.amount,
                        date: d.date,
                        recorded_by: e.recorded_by,
                        recorded_by_username: e.recorded_by_username,
                        receipt_number: d.receipt_number,
                        notes: d.notes,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            ExpenseEvent::ExpenseUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.expense_id) {
                    let d = e.details;
                    rm.category = d.category;
                    rm.description = d.description;
                    rm.amount = d.amount;
                    rm.date = d.date;
                    rm.receipt_number = d.receipt_number;
                    rm.notes = d.notes;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.expense_id, rm);
                }
            }
            ExpenseEvent::ExpenseDeleted(e) => {
                self.store.remove(tenant_id, &e.expense_id);
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillpoint_core::AggregateId;
    use tillpoint_expenses::{ExpenseDetails, ExpenseRecorded};

    use crate::projections::test_envelope;
    use crate::read_model::InMemoryTenantStore;

    #[test]
    fn filter_by_inclusive_date_range() {
        let p: ExpensesProjection<InMemoryTenantStore<ExpenseId, ExpenseReadModel>> =
            ExpensesProjection::new(InMemoryTenantStore::new());
        let t = TenantId::new();
        for day in [1, 15, 31] {
            let ev = ExpenseEvent::ExpenseRecorded(ExpenseRecorded {
                tenant_id: t,
                expense_id: ExpenseId::new(AggregateId::new()),
                recorded_by: UserId::new(),
                recorded_by_username: "kofi".into(),
                details: ExpenseDetails {
                    category: ExpenseCategory::Rent,
                    description: format!("day {day}"),
                    amount: Money::from_minor(100),
                    date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
                    receipt_number: None,
                    notes: None,
                },
                occurred_at: Utc::now(),
            });
            let id = ev.tenant_and_expense().1;
            p.apply_envelope(&test_envelope(AGGREGATE_TYPE, id.0, 1, &ev)).unwrap();
        }

        let rows = p.list(
            t,
            &ExpenseFilter {
                from: NaiveDate::from_ymd_opt(2025, 1, 15),
                to: NaiveDate::from_ymd_opt(2025, 1, 31),
                category: None,
            },
        );
        let days: Vec<_> = rows.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(days, ["day 31", "day 15"]);
    }
}
