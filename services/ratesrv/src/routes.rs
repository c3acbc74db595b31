//! API routes for the shipping rate service

use crate::api::{admin, catalog, price};
use crate::app::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create all API routes with state
pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(admin::health_check))
        // Rate lookup
        .route("/api/shipping/price", get(price::get_price))
        // Loaded tables
        .route("/api/shipping/rules", get(catalog::list_rules))
        .route("/api/shipping/countries", get(catalog::list_countries))
        .route("/api/shipping/countries/{code}", get(catalog::get_country))
        // Administration
        .route("/api/shipping/reload", post(admin::reload))
        // Apply HTTP request logging middleware
        .layer(axum::middleware::from_fn(common::logging::http_request_logger))
        .with_state(state)
}
