use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use tillpoint_auth::{Principal, UserId, permissions};
use tillpoint_infra::services::{NewUser, UserChanges};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", axum::routing::put(update_user).delete(delete_user))
        .route("/:id/toggle-active", post(toggle_active))
        .route("/:id/reset-password", post(reset_password))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::USERS_MANAGE)?;
    let users = services.till.projections().users.list(services.tenant_id());
    Ok(Json(serde_json::json!({ "items": users })))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::USERS_MANAGE)?;
    let user = services.till.register_user(
        services.tenant_id(),
        NewUser {
            username: body.username,
            role: body.role,
            password: body.password,
        },
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::USERS_MANAGE)?;
    let user_id = parse_id(&id, "user", UserId)?;
    let user = services.till.update_user(
        &principal,
        user_id,
        UserChanges {
            username: body.username,
            role: body.role,
        },
        Utc::now(),
    )?;
    Ok(Json(user))
}

pub async fn toggle_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::USERS_MANAGE)?;
    let user_id = parse_id(&id, "user", UserId)?;
    let user = services.till.toggle_user_active(&principal, user_id, Utc::now())?;
    Ok(Json(user))
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::USERS_MANAGE)?;
    let user_id = parse_id(&id, "user", UserId)?;
    let temporary_password = services.till.reset_password(&principal, user_id, Utc::now())?;
    Ok(Json(dto::TemporaryPasswordResponse {
        user_id,
        temporary_password,
    }))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::USERS_MANAGE)?;
    let user_id = parse_id(&id, "user", UserId)?;
    services.till.delete_user(&principal, user_id, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}
