//! User directory read model: sign-in lookup and the admin user list.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use tillpoint_auth::{Role, UserEvent, UserId};
use tillpoint_core::TenantId;
use tillpoint_events::EventEnvelope;

use super::cursor::{ProjectionError, StreamCursors, decode};
use crate::read_model::TenantStore;

pub const AGGREGATE_TYPE: &str = "auth.user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub active: bool,
    pub must_change_password: bool,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_password_change: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.store.get(tenant_id, user_id)
    }

    /// Live users sorted by username.
    pub fn list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        let mut users = self.store.list(tenant_id);
        users.sort_by_key(|u| u.username.to_lowercase());
        users
    }

    /// Case-insensitive username lookup.
    pub fn find_by_username(&self, tenant_id: TenantId, username: &str) -> Option<UserReadModel> {
        let wanted = username.trim().to_lowercase();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|u| u.username.to_lowercase() == wanted)
    }

    pub fn active_admin_count(&self, tenant_id: TenantId) -> usize {
        self.store
            .list(tenant_id)
            .iter()
            .filter(|u| u.active && u.role.is_admin())
            .count()
    }

    pub fn is_empty(&self, tenant_id: TenantId) -> bool {
        self.store.list(tenant_id).is_empty()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let event: UserEvent = decode(envelope, |e: &UserEvent| {
            let (t, u) = e.tenant_and_user();
            (t, u.0)
        })?;

        match event {
            UserEvent::Registered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.user_id,
                    UserReadModel {
                        user_id: e.user_id,
                        username: e.username,
                        role: e.role,
                        active: true,
                        must_change_password: e.temporary_password,
                        password_hash: e.password_hash,
                        created_at: e.occurred_at,
                        last_password_change: None,
                        updated_at: e.occurred_at,
                    },
                );
            }
            UserEvent::Updated(e) => self.modify(tenant_id, e.user_id, e.occurred_at, |u| {
                u.username = e.username;
                u.role = e.role;
            }),
            UserEvent::PasswordChanged(e) => {
                self.modify(tenant_id, e.user_id, e.occurred_at, |u| {
                    u.password_hash = e.password_hash;
                    u.must_change_password = false;
                    u.last_password_change = Some(e.occurred_at);
                })
            }
            UserEvent::PasswordReset(e) => self.modify(tenant_id, e.user_id, e.occurred_at, |u| {
                u.password_hash = e.temporary_password_hash;
                u.must_change_password = true;
            }),
            UserEvent::Activated(e) => {
                self.modify(tenant_id, e.user_id, e.occurred_at, |u| u.active = true)
            }
            UserEvent::Deactivated(e) => {
                self.modify(tenant_id, e.user_id, e.occurred_at, |u| u.active = false)
            }
            UserEvent::Deleted(e) => {
                self.store.remove(tenant_id, &e.user_id);
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn modify(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        at: DateTime<Utc>,
        change: impl FnOnce(&mut UserReadModel),
    ) {
        if let Some(mut model) = self.store.get(tenant_id, &user_id) {
            change(&mut model);
            model.updated_at = at;
            self.store.upsert(tenant_id, user_id, model);
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}
