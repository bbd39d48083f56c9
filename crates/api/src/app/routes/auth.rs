use std::sync::Arc;

use axum::{Extension, Json, response::IntoResponse};
use chrono::Utc;

use tillpoint_auth::{Principal, permissions};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = services
        .till
        .authenticate(services.tenant_id(), &body.username, &body.password)?;

    let now = Utc::now();
    let (token, expires_at) = services.issue_token(&user, now)?;
    tracing::info!(user = %user.username, role = user.role.as_str(), "signed in");

    Ok(Json(dto::TokenResponse { token, expires_at, user }))
}

/// Change one's own password. Returns a fresh token, since the old one may
/// still carry the temporary-password flag.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::ACCOUNT_CHANGE_PASSWORD)?;
    dto::passwords_match(&body)?;

    let now = Utc::now();
    services
        .till
        .change_password(&principal, &body.current_password, &body.new_password, now)?;

    let user = services.till.user(services.tenant_id(), principal.user_id)?;
    let (token, expires_at) = services.issue_token(&user, now)?;
    Ok(Json(dto::TokenResponse { token, expires_at, user }))
}
