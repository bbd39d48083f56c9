//! The authenticated staff member behind a request.

use serde::{Deserialize, Serialize};

use tillpoint_core::TenantId;

use crate::{Permission, Role, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub tenant_id: TenantId,
    pub role: Role,
    /// Set while the user still holds a temporary password.
    pub must_change_password: bool,
}

impl Principal {
    pub fn permissions(&self) -> &'static [Permission] {
        self.role.permissions()
    }

    pub fn has(&self, permission: &Permission) -> bool {
        self.permissions()
            .iter()
            .any(|p| p.is_wildcard() || p == permission)
    }

    /// Whether this principal may act on a record owned by `owner`.
    ///
    /// Managers and admins may act on anyone's records; cashiers only on their own.
    pub fn owns_or_supervises(&self, owner: UserId) -> bool {
        self.role.is_manager() || self.user_id == owner
    }
}
