//! Staff roles.
//!
//! A till has exactly three kinds of staff. Capabilities are derived from the
//! role; there is no per-user permission editing.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::permissions::{self, Permission};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    #[serde(alias = "clerk")]
    Cashier,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Cashier];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    /// Manager or admin.
    pub fn is_manager(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    pub fn can_manage_products(self) -> bool {
        self.is_manager()
    }

    pub fn can_view_reports(self) -> bool {
        self.is_manager()
    }

    pub fn can_manage_expenses(self) -> bool {
        self.is_manager()
    }

    pub fn can_make_sales(self) -> bool {
        true
    }

    /// Permissions granted by this role.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => permissions::ADMIN,
            Role::Manager => permissions::MANAGER,
            Role::Cashier => permissions::CASHIER,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}' (expected admin, manager or cashier)")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "cashier" | "clerk" => Ok(Role::Cashier),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clerk_is_a_legacy_name_for_cashier() {
        assert_eq!("clerk".parse::<Role>().unwrap(), Role::Cashier);
        assert_eq!(" Manager ".parse::<Role>().unwrap(), Role::Manager);
        assert!("owner".parse::<Role>().is_err());

        let r: Role = serde_json::from_str("\"clerk\"").unwrap();
        assert_eq!(r, Role::Cashier);
    }

    #[test]
    fn capabilities_follow_the_role_ladder() {
        assert!(Role::Cashier.can_make_sales());
        assert!(!Role::Cashier.can_manage_products());
        assert!(!Role::Cashier.can_view_reports());
        assert!(Role::Manager.can_manage_expenses());
        assert!(!Role::Manager.is_admin());
        assert!(Role::Admin.is_manager());
    }
}
