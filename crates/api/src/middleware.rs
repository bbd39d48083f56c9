use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use tillpoint_auth::Principal;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

/// Resolve the bearer token to a [`Principal`] and store it in the request
/// extensions.
///
/// Role and password state come from the users read model, not the token, so
/// a role change or deactivation takes effect on the next request.
pub async fn auth_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;
    let claims = services.validate_token(token, Utc::now())?;

    let user = services
        .till
        .projections()
        .users
        .get(claims.tenant_id, &claims.sub)
        .filter(|u| u.active)
        .ok_or_else(|| {
            debug!(user_id = %claims.sub, "token for unknown or disabled user");
            ApiError::unauthenticated("account is not active")
        })?;

    req.extensions_mut().insert(Principal {
        user_id: user.user_id,
        username: user.username,
        tenant_id: claims.tenant_id,
        role: user.role,
        must_change_password: user.must_change_password,
    });

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || ApiError::unauthenticated("missing bearer token");

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(missing)?
        .to_str()
        .map_err(|_| missing())?;

    let token = header.strip_prefix("Bearer ").ok_or_else(missing)?.trim();
    if token.is_empty() {
        return Err(missing());
    }
    Ok(token)
}
