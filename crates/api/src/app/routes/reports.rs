use std::sync::Arc;

use axum::{Extension, Json, extract::Query, response::IntoResponse};

use tillpoint_auth::{Principal, permissions};
use tillpoint_infra::reports::DateRange;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::today;
use crate::app::services::AppServices;
use crate::authz::require;

const SUMMARY_DEFAULT_DAYS: u64 = 7;
const BREAKDOWN_DEFAULT_DAYS: u64 = 30;

fn range(query: &dto::RangeQuery, default_days: u64) -> ApiResult<DateRange> {
    Ok(DateRange::resolve(query.start_date, query.end_date, today(), default_days)?)
}

/// Sales summary, last 7 days unless a range is given.
pub async fn sales_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::RangeQuery>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::REPORTS_READ)?;
    let range = range(&query, SUMMARY_DEFAULT_DAYS)?;
    Ok(Json(services.reports().sales_summary(services.tenant_id(), range, query.clerk_id)))
}

pub async fn sales_breakdown(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::RangeQuery>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::REPORTS_READ)?;
    let range = range(&query, BREAKDOWN_DEFAULT_DAYS)?;
    Ok(Json(services.reports().sales_breakdown(services.tenant_id(), range)))
}

pub async fn profits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::RangeQuery>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::REPORTS_READ)?;
    let range = range(&query, BREAKDOWN_DEFAULT_DAYS)?;
    Ok(Json(services.reports().profits(services.tenant_id(), range)))
}

/// Home screen. Everyone signed in may see it; stock values only for managers.
pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_READ)?;
    Ok(Json(services.reports().dashboard(services.tenant_id(), today(), principal.role)))
}
