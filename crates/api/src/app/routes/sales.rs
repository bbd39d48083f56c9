use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;

use tillpoint_auth::{Principal, permissions};
use tillpoint_sales::SaleId;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_sales))
        .route("/bulk-delete", post(bulk_delete))
        .route("/:id", get(get_sale).delete(delete_sale))
        .route("/:id/pending-cart", get(pending_cart))
        .route("/:id/status", post(change_status))
}

/// Newest first, 20 per page. Cashiers only see their own sales.
pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::SalesQuery>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::SALES_READ)?;
    Ok(Json(services.till.list_sales(
        &principal,
        query.status,
        query.page.unwrap_or(1),
    )))
}

/// Receipt view.
pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::SALES_READ)?;
    let sale_id = parse_id(&id, "sale", SaleId)?;
    Ok(Json(services.till.sale_for(&principal, sale_id)?))
}

pub async fn pending_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::SALES_CHECKOUT)?;
    let sale_id = parse_id(&id, "sale", SaleId)?;
    let lines = services.till.load_pending(&principal, sale_id)?;
    Ok(Json(json!({ "sale_id": sale_id, "items": lines })))
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::SALES_STATUS)?;
    let sale_id = parse_id(&id, "sale", SaleId)?;
    let sale = services
        .till
        .change_sale_status(services.tenant_id(), sale_id, body.status, Utc::now())?;
    Ok(Json(sale))
}

pub async fn delete_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::SALES_DELETE)?;
    let sale_id = parse_id(&id, "sale", SaleId)?;
    services.till.delete_sale(services.tenant_id(), sale_id, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::BulkDeleteRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::SALES_DELETE)?;
    let deleted = services
        .till
        .bulk_delete_sales(services.tenant_id(), &body.sale_ids, Utc::now())?;
    Ok(Json(json!({ "deleted": deleted })))
}
