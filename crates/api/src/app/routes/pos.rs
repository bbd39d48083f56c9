use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use chrono::Utc;

use tillpoint_auth::{Principal, permissions};
use tillpoint_core::Money;
use tillpoint_infra::services::{CartRequestItem, CheckoutRequest};
use tillpoint_sales::SaleStatus;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/preview", post(preview))
        .route("/checkout", post(checkout))
}

pub async fn preview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::PreviewRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::SALES_CHECKOUT)?;
    let items: Vec<CartRequestItem> = body.items.into_iter().map(Into::into).collect();
    Ok(Json(services.till.preview(services.tenant_id(), &items)?))
}

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::CheckoutBody>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::SALES_CHECKOUT)?;
    let items: Vec<CartRequestItem> = body.items.into_iter().map(Into::into).collect();

    let amount_paid = match dto::parse_optional_money(body.amount_paid.as_deref())? {
        Some(paid) => paid,
        None if body.status == SaleStatus::Completed => {
            services.till.preview(services.tenant_id(), &items)?.total
        }
        None => Money::ZERO,
    };

    let outcome = services.till.checkout(
        &principal,
        CheckoutRequest {
            items,
            status: body.status,
            payment_method: body.payment_method,
            amount_paid,
            continue_sale_id: body.continue_sale_id,
        },
        Utc::now(),
    )?;

    let status = if outcome.continued { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(outcome)))
}
