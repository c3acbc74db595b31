//! Reload and health endpoints

use crate::app::AppState;
use crate::error::rate_error;
use axum::{extract::State, http::StatusCode, Json};
use common::{AppError, SuccessResponse};
use serde::Serialize;
use shipping_rates::CacheMeta;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
    pub cache: CacheMeta,
}

/// Force a reload from the spreadsheet, bypassing the TTL
pub async fn reload(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    let meta = state.engine.load_from_sheet().await.map_err(rate_error)?;
    info!(
        "Shipping rates reloaded on request: {} rules, {} country configs",
        meta.total_rules, meta.total_country_configs
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Liveness plus cache state; never loads the sheet
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<SuccessResponse<HealthData>> {
    Json(SuccessResponse::new(HealthData {
        status: "ok",
        service: state.config.service.name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        cache: state.engine.cache_meta().await,
    }))
}
