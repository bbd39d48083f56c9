use axum::{Extension, Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

use tillpoint_auth::Principal;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn whoami(Extension(principal): Extension<Principal>) -> impl IntoResponse {
    Json(json!({
        "user_id": principal.user_id,
        "username": principal.username,
        "tenant_id": principal.tenant_id.to_string(),
        "role": principal.role,
        "must_change_password": principal.must_change_password,
        "permissions": principal.permissions().iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}
