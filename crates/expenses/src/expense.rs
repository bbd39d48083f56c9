use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_auth::UserId;
use tillpoint_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId};
use tillpoint_events::Event;

use crate::category::ExpenseCategory;

pub const DESCRIPTION_MAX_LEN: usize = 200;
pub const RECEIPT_MAX_LEN: usize = 50;
pub const NOTES_MAX_LEN: usize = 1000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(pub AggregateId);

impl ExpenseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Editable fields of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDetails {
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: Money,
    pub date: NaiveDate,
    pub receipt_number: Option<String>,
    pub notes: Option<String>,
}

fn trimmed_opt(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ExpenseDetails {
    /// Trimmed copy, or the first rule it breaks.
    pub fn validated(&self) -> Result<ExpenseDetails, DomainError> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(DomainError::validation("description is required"));
        }
        if description.chars().count() > DESCRIPTION_MAX_LEN {
            return Err(DomainError::validation(format!(
                "Description must be less than {DESCRIPTION_MAX_LEN} characters"
            )));
        }
        if self.amount.is_zero() {
            return Err(DomainError::validation("Amount must be greater than 0"));
        }
        let receipt_number = trimmed_opt(&self.receipt_number);
        if receipt_number
            .as_deref()
            .is_some_and(|r| r.chars().count() > RECEIPT_MAX_LEN)
        {
            return Err(DomainError::validation(format!(
                "Receipt number must be less than {RECEIPT_MAX_LEN} characters"
            )));
        }
        let notes = trimmed_opt(&self.notes);
        if notes.as_deref().is_some_and(|n| n.chars().count() > NOTES_MAX_LEN) {
            return Err(DomainError::validation(format!(
                "notes cannot exceed {NOTES_MAX_LEN} characters"
            )));
        }
        Ok(ExpenseDetails {
            category: self.category,
            description: description.to_string(),
            amount: self.amount,
            date: self.date,
            receipt_number,
            notes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    tenant_id: Option<TenantId>,
    details: Option<ExpenseDetails>,
    recorded_by: Option<UserId>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Expense {
    pub fn empty(id: ExpenseId) -> Self {
        Self {
            id,
            tenant_id: None,
            details: None,
            recorded_by: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn details(&self) -> Option<&ExpenseDetails> {
        self.details.as_ref()
    }

    pub fn recorded_by(&self) -> Option<UserId> {
        self.recorded_by
    }

    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }

    fn ensure_live(&self, tenant_id: TenantId, expense_id: ExpenseId) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found("expense"));
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != expense_id {
            return Err(DomainError::invariant("expense_id mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for Expense {
    type Id = ExpenseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordExpense {
    pub tenant_id: TenantId,
    pub expense_id: ExpenseId,
    pub recorded_by: UserId,
    pub recorded_by_username: String,
    pub details: ExpenseDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateExpense {
    pub tenant_id: TenantId,
    pub expense_id: ExpenseId,
    pub details: ExpenseDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteExpense {
    pub tenant_id: TenantId,
    pub expense_id: ExpenseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExpenseCommand {
    Record(RecordExpense),
    Update(UpdateExpense),
    Delete(DeleteExpense),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecorded {
    pub tenant_id: TenantId,
    pub expense_id: ExpenseId,
    pub recorded_by: UserId,
    pub recorded_by_username: String,
    pub details: ExpenseDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseUpdated {
    pub tenant_id: TenantId,
    pub expense_id: ExpenseId,
    pub details: ExpenseDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDeleted {
    pub tenant_id: TenantId,
    pub expense_id: ExpenseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseEvent {
    ExpenseRecorded(ExpenseRecorded),
    ExpenseUpdated(ExpenseUpdated),
    ExpenseDeleted(ExpenseDeleted),
}

impl ExpenseEvent {
    pub fn tenant_and_expense(&self) -> (TenantId, ExpenseId) {
        match self {
            ExpenseEvent::ExpenseRecorded(e) => (e.tenant_id, e.expense_id),
            ExpenseEvent::ExpenseUpdated(e) => (e.tenant_id, e.expense_id),
            ExpenseEvent::ExpenseDeleted(e) => (e.tenant_id, e.expense_id),
        }
    }
}

impl Event for ExpenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExpenseEvent::ExpenseRecorded(_) => "expenses.expense.recorded",
            ExpenseEvent::ExpenseUpdated(_) => "expenses.expense.updated",
            ExpenseEvent::ExpenseDeleted(_) => "expenses.expense.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExpenseEvent::ExpenseRecorded(e) => e.occurred_at,
            ExpenseEvent::ExpenseUpdated(e) => e.occurred_at,
            ExpenseEvent::ExpenseDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Expense {
    type Command = ExpenseCommand;
    type Event = ExpenseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExpenseEvent::ExpenseRecorded(e) => {
                self.id = e.expense_id;
                self.tenant_id = Some(e.tenant_id);
                self.recorded_by = Some(e.recorded_by);
                self.details = Some(e.details.clone());
                self.created = true;
            }
            ExpenseEvent::ExpenseUpdated(e) => {
                self.details = Some(e.details.clone());
            }
            ExpenseEvent::ExpenseDeleted(_) => {
                self.deleted = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ExpenseCommand::Record(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("expense already exists"));
                }
                if cmd.expense_id != self.id {
                    return Err(DomainError::invariant("expense_id mismatch"));
                }
                Ok(vec![ExpenseEvent::ExpenseRecorded(ExpenseRecorded {
                    tenant_id: cmd.tenant_id,
                    expense_id: cmd.expense_id,
                    recorded_by: cmd.recorded_by,
                    recorded_by_username: cmd.recorded_by_username.clone(),
                    details: cmd.details.validated()?,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ExpenseCommand::Update(cmd) => {
                self.ensure_live(cmd.tenant_id, cmd.expense_id)?;
                let details = cmd.details.validated()?;
                if self.details.as_ref() == Some(&details) {
                    return Ok(vec![]);
                }
                Ok(vec![ExpenseEvent::ExpenseUpdated(ExpenseUpdated {
                    tenant_id: cmd.tenant_id,
                    expense_id: cmd.expense_id,
                    details,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ExpenseCommand::Delete(cmd) => {
                self.ensure_live(cmd.tenant_id, cmd.expense_id)?;
                Ok(vec![ExpenseEvent::ExpenseDeleted(ExpenseDeleted {
                    tenant_id: cmd.tenant_id,
                    expense_id: cmd.expense_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
