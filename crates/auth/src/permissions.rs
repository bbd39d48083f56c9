//! Permission names and the static role → permission table.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A named capability, e.g. `sales.checkout`. `*` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const WILDCARD: Permission = Permission::from_static("*");

pub const ACCOUNT_CHANGE_PASSWORD: Permission = Permission::from_static("account.change_password");

pub const CATALOG_READ: Permission = Permission::from_static("catalog.read");
pub const CATALOG_WRITE: Permission = Permission::from_static("catalog.write");
pub const CATALOG_DELETE: Permission = Permission::from_static("catalog.delete");

pub const SALES_CHECKOUT: Permission = Permission::from_static("sales.checkout");
pub const SALES_READ: Permission = Permission::from_static("sales.read");
/// See every clerk's sales, not only one's own.
pub const SALES_READ_ALL: Permission = Permission::from_static("sales.read_all");
pub const SALES_STATUS: Permission = Permission::from_static("sales.status");
pub const SALES_DELETE: Permission = Permission::from_static("sales.delete");

pub const EXPENSES_RECORD: Permission = Permission::from_static("expenses.record");
pub const EXPENSES_MANAGE: Permission = Permission::from_static("expenses.manage");

pub const REPORTS_READ: Permission = Permission::from_static("reports.read");

pub const USERS_MANAGE: Permission = Permission::from_static("users.manage");

pub const CASHIER: &[Permission] = &[
    ACCOUNT_CHANGE_PASSWORD,
    CATALOG_READ,
    SALES_CHECKOUT,
    SALES_READ,
    EXPENSES_RECORD,
];

pub const MANAGER: &[Permission] = &[
    ACCOUNT_CHANGE_PASSWORD,
    CATALOG_READ,
    CATALOG_WRITE,
    SALES_CHECKOUT,
    SALES_READ,
    SALES_READ_ALL,
    SALES_STATUS,
    EXPENSES_RECORD,
    EXPENSES_MANAGE,
    REPORTS_READ,
];

pub const ADMIN: &[Permission] = &[WILDCARD];
