//! HTTP API for the till: JSON over axum, bearer tokens, role checks.

pub mod app;
pub mod authz;
pub mod config;
pub mod middleware;
