use axum::{
    Router,
    routing::{get, post},
};

pub mod auth;
pub mod common;
pub mod expenses;
pub mod pos;
pub mod products;
pub mod reports;
pub mod sales;
pub mod system;
pub mod users;

/// Routes reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/auth/change-password", post(auth::change_password))
        .route("/dashboard", get(reports::dashboard))
        .route("/reports/sales", get(reports::sales_report))
        .route("/reports/sales-breakdown", get(reports::sales_breakdown))
        .route("/reports/profits", get(reports::profits))
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/pos", pos::router())
        .nest("/sales", sales::router())
        .nest("/expenses", expenses::router())
}
