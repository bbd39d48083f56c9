use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use tillpoint_auth::{Principal, permissions};
use tillpoint_core::DomainError;
use tillpoint_infra::projections::ProductFilter;
use tillpoint_infra::read_model::Page;
use tillpoint_infra::services::NewProduct;
use tillpoint_products::{Category, ProductId};

use crate::app::dto::{self, ProductView};
use crate::app::errors::ApiResult;
use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::authz::require;

pub const PRODUCTS_PAGE_SIZE: usize = 20;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/all", get(all_products))
        .route("/search", get(search_products))
        .route("/stats", get(product_stats))
        .route("/bulk", post(bulk_add_products))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/:id/stock", post(update_stock))
}

/// Management listing: name, SKU or description match, paginated.
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::ProductsQuery>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_READ)?;
    let hits = services.till.projections().products.search(
        services.tenant_id(),
        &ProductFilter {
            query: query.q,
            category: query.category,
            search_description: true,
        },
    );
    let page = Page::of(hits, query.page.unwrap_or(1), PRODUCTS_PAGE_SIZE);
    Ok(Json(page.map(ProductView::from)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<Category>,
}

pub async fn all_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<CategoryQuery>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_READ)?;
    let items: Vec<ProductView> = services
        .till
        .projections()
        .products
        .search(
            services.tenant_id(),
            &ProductFilter {
                category: query.category,
                ..ProductFilter::default()
            },
        )
        .into_iter()
        .map(ProductView::from)
        .collect();
    Ok(Json(serde_json::json!({ "items": items })))
}

/// Till search: name or SKU. Nothing to search for yields an empty list.
pub async fn search_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<dto::SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_READ)?;
    let q = query.q.trim();
    if q.is_empty() && query.category.is_none() {
        return Ok(Json(Vec::<ProductView>::new()));
    }
    let hits = services.till.projections().products.search(
        services.tenant_id(),
        &ProductFilter {
            query: Some(q.to_string()),
            category: query.category,
            search_description: false,
        },
    );
    Ok(Json(hits.into_iter().map(ProductView::from).collect::<Vec<_>>()))
}

pub async fn product_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::REPORTS_READ)?;
    Ok(Json(services.reports().catalog_stats(services.tenant_id())))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_READ)?;
    let product_id = parse_id(&id, "product", ProductId)?;
    let product = services
        .till
        .projections()
        .products
        .get(services.tenant_id(), &product_id)
        .ok_or_else(|| DomainError::not_found("product"))?;
    Ok(Json(ProductView::from(product)))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::ProductRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_WRITE)?;
    let product = services.till.create_product(
        services.tenant_id(),
        NewProduct {
            details: body.details()?,
            packs: body.quantity.unwrap_or(0),
            sku: body.sku.filter(|s| !s.trim().is_empty()),
        },
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(ProductView::from(product))))
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::ProductRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_WRITE)?;
    let product_id = parse_id(&id, "product", ProductId)?;
    let product = services.till.update_product(
        services.tenant_id(),
        product_id,
        body.details()?,
        body.quantity,
        Utc::now(),
    )?;
    Ok(Json(ProductView::from(product)))
}

pub async fn update_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::StockRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_WRITE)?;
    let product_id = parse_id(&id, "product", ProductId)?;
    let product = services
        .till
        .update_stock(services.tenant_id(), product_id, body.into(), Utc::now())?;
    Ok(Json(ProductView::from(product)))
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_DELETE)?;
    let product_id = parse_id(&id, "product", ProductId)?;
    services
        .till
        .delete_product(services.tenant_id(), product_id, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_add_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::BulkProductsRequest>,
) -> ApiResult<impl IntoResponse> {
    require(&services, &principal, &permissions::CATALOG_WRITE)?;
    let report = services
        .till
        .bulk_add_products(services.tenant_id(), &body.rows, Utc::now())?;
    Ok(Json(report))
}
