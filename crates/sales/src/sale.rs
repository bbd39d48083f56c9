use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_auth::UserId;
use tillpoint_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId};
use tillpoint_events::Event;

use crate::invoice::InvoiceNumber;
use crate::quote::{SaleLine, sum_lines};
use crate::status::{PaymentMethod, SaleStatus};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Payment side of a sale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub amount_paid: Money,
    pub change_given: Money,
}

impl Payment {
    /// Settle `total` with `amount_paid`.
    ///
    /// A completed sale must be paid in full; a pending one may be underpaid.
    pub fn settle(
        status: SaleStatus,
        method: PaymentMethod,
        total: Money,
        amount_paid: Money,
    ) -> Result<Self, DomainError> {
        if status == SaleStatus::Completed && amount_paid < total {
            return Err(DomainError::validation("Payment amount is less than total amount"));
        }
        Ok(Self {
            method,
            amount_paid,
            change_given: amount_paid.saturating_sub(total),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    tenant_id: Option<TenantId>,
    invoice_number: Option<InvoiceNumber>,
    clerk_id: Option<UserId>,
    status: SaleStatus,
    lines: Vec<SaleLine>,
    total: Money,
    total_profit: i64,
    payment: Option<Payment>,
    opened_at: Option<DateTime<Utc>>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Sale {
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            tenant_id: None,
            invoice_number: None,
            clerk_id: None,
            status: SaleStatus::Completed,
            lines: Vec::new(),
            total: Money::ZERO,
            total_profit: 0,
            payment: None,
            opened_at: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn invoice_number(&self) -> Option<InvoiceNumber> {
        self.invoice_number
    }

    pub fn clerk_id(&self) -> Option<UserId> {
        self.clerk_id
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn total_profit(&self) -> i64 {
        self.total_profit
    }

    pub fn payment(&self) -> Option<Payment> {
        self.payment
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn is_live(&self) -> bool {
        self.created && !self.deleted
    }

    fn ensure_live(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::not_found("sale"));
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != sale_id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub invoice_number: InvoiceNumber,
    pub clerk_id: UserId,
    pub clerk_username: String,
    pub lines: Vec<SaleLine>,
    /// `Completed` or `Pending`.
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub amount_paid: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Replace the cart of a pending sale, optionally completing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviseSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub lines: Vec<SaleLine>,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub amount_paid: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSaleStatus {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub status: SaleStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SaleCommand {
    Open(OpenSale),
    Revise(ReviseSale),
    ChangeStatus(ChangeSaleStatus),
    Delete(DeleteSale),
}

// ── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleOpened {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub invoice_number: InvoiceNumber,
    pub clerk_id: UserId,
    pub clerk_username: String,
    pub lines: Vec<SaleLine>,
    pub status: SaleStatus,
    pub total: Money,
    pub total_profit: i64,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRevised {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub lines: Vec<SaleLine>,
    pub status: SaleStatus,
    pub total: Money,
    pub total_profit: i64,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleStatusChanged {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub from: SaleStatus,
    pub to: SaleStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDeleted {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleOpened(SaleOpened),
    SaleRevised(SaleRevised),
    SaleStatusChanged(SaleStatusChanged),
    SaleDeleted(SaleDeleted),
}

impl SaleEvent {
    pub fn tenant_and_sale(&self) -> (TenantId, SaleId) {
        match self {
            SaleEvent::SaleOpened(e) => (e.tenant_id, e.sale_id),
            SaleEvent::SaleRevised(e) => (e.tenant_id, e.sale_id),
            SaleEvent::SaleStatusChanged(e) => (e.tenant_id, e.sale_id),
            SaleEvent::SaleDeleted(e) => (e.tenant_id, e.sale_id),
        }
    }
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleOpened(_) => "sales.sale.opened",
            SaleEvent::SaleRevised(_) => "sales.sale.revised",
            SaleEvent::SaleStatusChanged(_) => "sales.sale.status_changed",
            SaleEvent::SaleDeleted(_) => "sales.sale.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleOpened(e) => e.occurred_at,
            SaleEvent::SaleRevised(e) => e.occurred_at,
            SaleEvent::SaleStatusChanged(e) => e.occurred_at,
            SaleEvent::SaleDeleted(e) => e.occurred_at,
        }
    }
}

// ── Aggregate ───────────────────────────────────────────────────────────────

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleOpened(e) => {
                self.id = e.sale_id;
                self.tenant_id = Some(e.tenant_id);
                self.invoice_number = Some(e.invoice_number);
                self.clerk_id = Some(e.clerk_id);
                self.status = e.status;
                self.lines = e.lines.clone();
                self.total = e.total;
                self.total_profit = e.total_profit;
                self.payment = Some(e.payment);
                self.opened_at = Some(e.occurred_at);
                self.created = true;
            }
            SaleEvent::SaleRevised(e) => {
                self.status = e.status;
                self.lines = e.lines.clone();
                self.total = e.total;
                self.total_profit = e.total_profit;
                self.payment = Some(e.payment);
            }
            SaleEvent::SaleStatusChanged(e) => {
                self.status = e.to;
            }
            SaleEvent::SaleDeleted(_) => {
                self.deleted = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::Open(cmd) => self.handle_open(cmd),
            SaleCommand::Revise(cmd) => self.handle_revise(cmd),
            SaleCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            SaleCommand::Delete(cmd) => {
                self.ensure_live(cmd.tenant_id, cmd.sale_id)?;
                Ok(vec![SaleEvent::SaleDeleted(SaleDeleted {
                    tenant_id: cmd.tenant_id,
                    sale_id: cmd.sale_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

fn checkout_status(status: SaleStatus) -> Result<SaleStatus, DomainError> {
    match status {
        SaleStatus::Completed | SaleStatus::Pending => Ok(status),
        SaleStatus::Cancelled => Err(DomainError::validation(
            "a sale can only be checked out as completed or pending",
        )),
    }
}

impl Sale {
    fn handle_open(&self, cmd: &OpenSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already exists"));
        }
        if cmd.sale_id != self.id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("No items in cart"));
        }
        let status = checkout_status(cmd.status)?;
        let (total, total_profit) = sum_lines(&cmd.lines)?;
        let payment = Payment::settle(status, cmd.payment_method, total, cmd.amount_paid)?;

        Ok(vec![SaleEvent::SaleOpened(SaleOpened {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            invoice_number: cmd.invoice_number,
            clerk_id: cmd.clerk_id,
            clerk_username: cmd.clerk_username.clone(),
            lines: cmd.lines.clone(),
            status,
            total,
            total_profit,
            payment,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(&self, cmd: &ReviseSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.sale_id)?;
        if self.status != SaleStatus::Pending {
            return Err(DomainError::invariant("only pending sales can be continued"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("No items in cart"));
        }
        let status = checkout_status(cmd.status)?;
        let (total, total_profit) = sum_lines(&cmd.lines)?;
        let payment = Payment::settle(status, cmd.payment_method, total, cmd.amount_paid)?;

        Ok(vec![SaleEvent::SaleRevised(SaleRevised {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            lines: cmd.lines.clone(),
            status,
            total,
            total_profit,
            payment,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeSaleStatus) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.sale_id)?;
        if cmd.status == self.status {
            return Ok(vec![]);
        }
        Ok(vec![SaleEvent::SaleStatusChanged(SaleStatusChanged {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}
