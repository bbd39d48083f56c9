//! Authorization checks (pure; no IO).

use thiserror::Error;

use tillpoint_core::TenantId;

use crate::{Permission, Principal, permissions};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("password change required before continuing")]
    PasswordChangeRequired,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Check that `principal` may perform `required` inside `tenant_id`.
///
/// A principal holding a temporary password may only change it.
pub fn authorize(
    principal: &Principal,
    tenant_id: TenantId,
    required: &Permission,
) -> Result<(), AuthzError> {
    if principal.tenant_id != tenant_id {
        return Err(AuthzError::TenantMismatch);
    }
    if principal.must_change_password && *required != permissions::ACCOUNT_CHANGE_PASSWORD {
        return Err(AuthzError::PasswordChangeRequired);
    }
    if principal.has(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
