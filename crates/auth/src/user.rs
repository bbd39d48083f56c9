//! Staff user aggregate (event-sourced).
//!
//! Usernames are unique per store, but uniqueness spans streams, so it is
//! checked by the caller against the users read model before dispatching.
//! The aggregate only guards its own lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use tillpoint_events::Event;

use crate::Role;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub AggregateId);

impl UserId {
    pub fn new() -> Self {
        Self(AggregateId::new())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<AggregateId> for UserId {
    fn from(value: AggregateId) -> Self {
        Self(value)
    }
}

impl core::str::FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Normalize and validate a username: trimmed, 3–20 characters.
pub fn normalize_username(raw: &str) -> Result<String, DomainError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(DomainError::validation(format!(
            "username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        )));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("username cannot contain spaces"));
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub username: String,
    pub role: Role,
    pub password_hash: String,
    pub active: bool,
    pub must_change_password: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_password_change: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub version: u64,
    pub created: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            tenant_id: None,
            username: String::new(),
            role: Role::Cashier,
            password_hash: String::new(),
            active: false,
            must_change_password: false,
            created_at: None,
            last_password_change: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    /// Whether this account may sign in at all (password aside).
    pub fn can_sign_in(&self) -> bool {
        self.created && !self.deleted && self.active
    }

    fn ensure_live(&self, tenant_id: TenantId, user_id: UserId) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found("user"));
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != user_id {
            return Err(DomainError::invariant("user_id mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub password_hash: String,
    /// Issue as a temporary password the user must replace on first sign-in.
    pub temporary_password: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPassword {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub temporary_password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUserActive {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    Update(UpdateUser),
    ChangePassword(ChangePassword),
    ResetPassword(ResetPassword),
    SetActive(SetUserActive),
    Delete(DeleteUser),
}

// ── Events ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub password_hash: String,
    pub temporary_password: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub temporary_password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeactivated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleted {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    Updated(UserUpdated),
    PasswordChanged(PasswordChanged),
    PasswordReset(PasswordReset),
    Activated(UserActivated),
    Deactivated(UserDeactivated),
    Deleted(UserDeleted),
}

impl UserEvent {
    pub fn tenant_and_user(&self) -> (TenantId, UserId) {
        match self {
            UserEvent::Registered(e) => (e.tenant_id, e.user_id),
            UserEvent::Updated(e) => (e.tenant_id, e.user_id),
            UserEvent::PasswordChanged(e) => (e.tenant_id, e.user_id),
            UserEvent::PasswordReset(e) => (e.tenant_id, e.user_id),
            UserEvent::Activated(e) => (e.tenant_id, e.user_id),
            UserEvent::Deactivated(e) => (e.tenant_id, e.user_id),
            UserEvent::Deleted(e) => (e.tenant_id, e.user_id),
        }
    }
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "auth.user.registered",
            UserEvent::Updated(_) => "auth.user.updated",
            UserEvent::PasswordChanged(_) => "auth.user.password_changed",
            UserEvent::PasswordReset(_) => "auth.user.password_reset",
            UserEvent::Activated(_) => "auth.user.activated",
            UserEvent::Deactivated(_) => "auth.user.deactivated",
            UserEvent::Deleted(_) => "auth.user.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::Updated(e) => e.occurred_at,
            UserEvent::PasswordChanged(e) => e.occurred_at,
            UserEvent::PasswordReset(e) => e.occurred_at,
            UserEvent::Activated(e) => e.occurred_at,
            UserEvent::Deactivated(e) => e.occurred_at,
            UserEvent::Deleted(e) => e.occurred_at,
        }
    }
}

// ── Aggregate ───────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => {
                self.id = e.user_id;
                self.tenant_id = Some(e.tenant_id);
                self.username = e.username.clone();
                self.role = e.role;
                self.password_hash = e.password_hash.clone();
                self.active = true;
                self.must_change_password = e.temporary_password;
                self.created_at = Some(e.occurred_at);
                self.last_password_change = Some(e.occurred_at);
                self.created = true;
            }
            UserEvent::Updated(e) => {
                self.username = e.username.clone();
                self.role = e.role;
            }
            UserEvent::PasswordChanged(e) => {
                self.password_hash = e.password_hash.clone();
                self.must_change_password = false;
                self.last_password_change = Some(e.occurred_at);
            }
            UserEvent::PasswordReset(e) => {
                self.password_hash = e.temporary_password_hash.clone();
                self.must_change_password = true;
                self.last_password_change = Some(e.occurred_at);
            }
            UserEvent::Activated(_) => self.active = true,
            UserEvent::Deactivated(_) => self.active = false,
            UserEvent::Deleted(_) => {
                self.deleted = true;
                self.active = false;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("user already exists"));
                }
                if cmd.user_id != self.id {
                    return Err(DomainError::invariant("user_id mismatch"));
                }
                let username = normalize_username(&cmd.username)?;
                if cmd.password_hash.is_empty() {
                    return Err(DomainError::validation("password hash is required"));
                }
                Ok(vec![UserEvent::Registered(UserRegistered {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    username,
                    role: cmd.role,
                    password_hash: cmd.password_hash.clone(),
                    temporary_password: cmd.temporary_password,
                    occurred_at: cmd.occurred_at,
                })])
            }
            UserCommand::Update(cmd) => {
                self.ensure_live(cmd.tenant_id, cmd.user_id)?;
                let username = normalize_username(&cmd.username)?;
                if username == self.username && cmd.role == self.role {
                    return Ok(vec![]);
                }
                Ok(vec![UserEvent::Updated(UserUpdated {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    username,
                    role: cmd.role,
                    occurred_at: cmd.occurred_at,
                })])
            }
            UserCommand::ChangePassword(cmd) => {
                self.ensure_live(cmd.tenant_id, cmd.user_id)?;
                if cmd.password_hash.is_empty() {
                    return Err(DomainError::validation("password hash is required"));
                }
                Ok(vec![UserEvent::PasswordChanged(PasswordChanged {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    password_hash: cmd.password_hash.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            UserCommand::ResetPassword(cmd) => {
                self.ensure_live(cmd.tenant_id, cmd.user_id)?;
                if cmd.temporary_password_hash.is_empty() {
                    return Err(DomainError::validation("password hash is required"));
                }
                Ok(vec![UserEvent::PasswordReset(PasswordReset {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    temporary_password_hash: cmd.temporary_password_hash.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            UserCommand::SetActive(cmd) => {
                self.ensure_live(cmd.tenant_id, cmd.user_id)?;
                if cmd.active == self.active {
                    return Ok(vec![]);
                }
                let event = if cmd.active {
                    UserEvent::Activated(UserActivated {
                        tenant_id: cmd.tenant_id,
                        user_id: cmd.user_id,
                        occurred_at: cmd.occurred_at,
                    })
                } else {
                    UserEvent::Deactivated(UserDeactivated {
                        tenant_id: cmd.tenant_id,
                        user_id: cmd.user_id,
                        occurred_at: cmd.occurred_at,
                    })
                };
                Ok(vec![event])
            }
            UserCommand::Delete(cmd) => {
                self.ensure_live(cmd.tenant_id, cmd.user_id)?;
                Ok(vec![UserEvent::Deleted(UserDeleted {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
