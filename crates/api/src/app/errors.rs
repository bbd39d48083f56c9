use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use tillpoint_auth::{AuthzError, TokenValidationError};
use tillpoint_core::DomainError;
use tillpoint_infra::PosError;
use tillpoint_infra::command_dispatcher::DispatchError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error body: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }

    fn internal(code: &'static str, detail: impl std::fmt::Display) -> Self {
        error!(code, error = %detail, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, "internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": {
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::bad_request(msg),
            DomainError::InvalidId(msg) => Self::new(StatusCode::BAD_REQUEST, "invalid_id", msg),
            DomainError::InvariantViolation(msg) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
            }
            DomainError::InsufficientStock(msg) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", msg)
            }
            DomainError::NotFound(what) => Self::new(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
            DomainError::Conflict(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            DomainError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, "forbidden", msg),
            DomainError::Unauthorized => Self::unauthenticated("Invalid username or password"),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Domain(e) => e.into(),
            DispatchError::Concurrency(msg) => Self::new(
                StatusCode::CONFLICT,
                "conflict",
                format!("the record changed while saving; try again ({msg})"),
            ),
            DispatchError::TenantIsolation(msg) => Self::new(StatusCode::FORBIDDEN, "tenant_isolation", msg),
            DispatchError::Deserialize(msg) => Self::internal("deserialize_error", msg),
            DispatchError::Store(e) => Self::internal("store_error", e),
            DispatchError::Publish(msg) => Self::internal("publish_error", msg),
        }
    }
}

impl From<PosError> for ApiError {
    fn from(err: PosError) -> Self {
        match err {
            PosError::Domain(e) => e.into(),
            PosError::Dispatch(e) => e.into(),
            PosError::Compensation(msg) => Self::internal("compensation_failed", msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        let code = match err {
            AuthzError::TenantMismatch => "tenant_mismatch",
            AuthzError::PasswordChangeRequired => "password_change_required",
            AuthzError::Forbidden(_) => "forbidden",
        };
        Self::new(StatusCode::FORBIDDEN, code, err.to_string())
    }
}

impl From<TokenValidationError> for ApiError {
    fn from(err: TokenValidationError) -> Self {
        Self::unauthenticated(err.to_string())
    }
}
