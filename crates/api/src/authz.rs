//! Permission guard called by handlers before they touch the till.

use tillpoint_auth::{Permission, Principal, authorize};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

/// Check `principal` holds `permission` in the tenant this process serves.
pub fn require(services: &AppServices, principal: &Principal, permission: &Permission) -> Result<(), ApiError> {
    authorize(principal, services.tenant_id(), permission).map_err(|e| {
        tracing::info!(
            user = %principal.username,
            permission = %permission,
            reason = %e,
            "request denied"
        );
        ApiError::from(e)
    })
}
