//! Rule and country-default listings

use crate::app::AppState;
use crate::error::rate_error;
use axum::{
    extract::{Path, State},
    Json,
};
use common::{AppError, SuccessResponse};
use serde::Serialize;
use shipping_rates::{CacheMeta, CountryConfig, ShippingRule};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct RulesData {
    pub cache: CacheMeta,
    pub currency: String,
    pub default_method: String,
    pub supported_methods: Vec<String>,
    pub total_rules: usize,
    pub rules: Vec<ShippingRule>,
}

#[derive(Debug, Serialize)]
pub struct CountriesData {
    pub total: usize,
    pub countries: Vec<CountryConfig>,
}

/// All loaded rules with the cache state they came from
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse<RulesData>>, AppError> {
    let engine = &state.engine;
    let (rules, cache) = engine.get_rules_with_meta().await.map_err(rate_error)?;

    Ok(Json(SuccessResponse::new(RulesData {
        cache,
        currency: engine.currency().to_string(),
        default_method: engine.default_method().to_string(),
        supported_methods: engine.supported_methods().to_vec(),
        total_rules: rules.len(),
        rules,
    })))
}

pub async fn list_countries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse<CountriesData>>, AppError> {
    let countries = state
        .engine
        .get_country_configs()
        .await
        .map_err(rate_error)?;

    Ok(Json(SuccessResponse::new(CountriesData {
        total: countries.len(),
        countries,
    })))
}

pub async fn get_country(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<SuccessResponse<CountryConfig>>, AppError> {
    state
        .engine
        .get_country_config(&code)
        .await
        .map_err(rate_error)?
        .map(|config| Json(SuccessResponse::new(config)))
        .ok_or_else(|| AppError::not_found(format!("Country {} not found", code)))
}
