use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use chrono::Utc;
use serde_json::json;

use tillpoint_auth::{Principal, permissions};
use tillpoint_core::Money;
use tillpoint_expenses::ExpenseId;
use tillpoint_infra::projections::ExpenseFilter;
use tillpoint_infra::reports::{DateRange, EXPENSE_SUMMARY_DAYS};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{parse_id, today};
use crate::app::services::AppServices;
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_expenses).post(record_expense))
        .route("/summary", get(expense_summary))
        .route("/:id", put(update_expense).delete(delete_expense))
}

pub async fn list_expenses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::ExpensesQuery>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::EXPENSES_MANAGE)?;
    // Without a start date the list shows the current month.
    let month = DateRange::month_to_date(today());
    let items = services.till.projections().expenses.list(
        services.tenant_id(),
        &ExpenseFilter {
            from: query.start_date.or(Some(month.start)),
            to: query.end_date.or(Some(month.end)),
            category: query.category,
        },
    );
    let total: Money = items.iter().map(|e| e.amount).sum();
    Ok(Json(json!({ "items": items, "total": total })))
}

pub async fn record_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::ExpenseRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::EXPENSES_RECORD)?;
    let expense = services
        .till
        .record_expense(&principal, body.details(today())?, Utc::now())?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn update_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::ExpenseRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::EXPENSES_MANAGE)?;
    let expense_id = parse_id(&id, "expense", ExpenseId)?;
    let expense = services.till.update_expense(
        services.tenant_id(),
        expense_id,
        body.details(today())?,
        Utc::now(),
    )?;
    Ok(Json(expense))
}

pub async fn delete_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::EXPENSES_MANAGE)?;
    let expense_id = parse_id(&id, "expense", ExpenseId)?;
    services
        .till
        .delete_expense(services.tenant_id(), expense_id, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}

/// Defaults to the last 30 days.
pub async fn expense_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::RangeQuery>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::EXPENSES_MANAGE)?;
    let range = DateRange::resolve(query.start_date, query.end_date, today(), EXPENSE_SUMMARY_DAYS)?;
    Ok(Json(services.reports().expense_summary(services.tenant_id(), range)))
}
