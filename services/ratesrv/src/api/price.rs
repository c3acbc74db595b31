//! Rate lookup endpoint

use crate::app::AppState;
use crate::error::rate_error;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use common::serde_helpers::{deserialize_optional_f64, deserialize_optional_string};
use common::{AppError, SuccessResponse};
use serde::{Deserialize, Serialize};
use shipping_rates::{PriceMatch, PriceQuery};
use std::sync::Arc;

/// `GET /api/shipping/price` query string
#[derive(Debug, Default, Deserialize)]
pub struct PriceParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub province: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub method: Option<String>,
}

impl PriceParams {
    /// Validate required fields and build the engine query
    pub fn into_query(self) -> Result<PriceQuery, AppError> {
        let country = self
            .country
            .ok_or_else(|| AppError::invalid_field("country", "country is required"))?;
        let weight = self
            .weight
            .ok_or_else(|| AppError::invalid_field("weight", "weight is required"))?;
        if weight < 0.0 {
            return Err(AppError::invalid_field("weight", "weight must not be negative"));
        }

        Ok(PriceQuery {
            country,
            province: self.province.unwrap_or_default(),
            district: self.district.unwrap_or_default(),
            weight,
            method: self.method,
        })
    }
}

/// Rule fields echoed back with a price
#[derive(Debug, Serialize)]
pub struct MatchedRule {
    pub country: String,
    pub province: String,
    pub district: String,
    pub method: String,
    pub min_weight: f64,
    pub max_weight: f64,
}

#[derive(Debug, Serialize)]
pub struct PriceData {
    pub currency: String,
    pub price: f64,
    pub matched_rule: MatchedRule,
}

impl PriceData {
    fn new(currency: &str, matched: PriceMatch) -> Self {
        let rule = matched.rule;
        Self {
            currency: currency.to_string(),
            price: matched.price,
            matched_rule: MatchedRule {
                country: rule.country,
                province: rule.province,
                district: rule.district,
                method: rule.shipping_method,
                min_weight: rule.min_weight,
                max_weight: rule.max_weight,
            },
        }
    }
}

/// Resolve the shipping rate for a destination and weight
pub async fn get_price(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PriceParams>, QueryRejection>,
) -> Result<Json<SuccessResponse<PriceData>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    let query = params.into_query()?;

    let engine = &state.engine;
    match engine.get_price(&query).await.map_err(rate_error)? {
        Some(matched) => Ok(Json(SuccessResponse::new(PriceData::new(
            engine.currency(),
            matched,
        )))),
        None => {
            let method = query.method.as_deref().unwrap_or(engine.default_method());
            Err(AppError::not_found(format!(
                "No shipping rule for {}/{}/{} ({}) at weight {}",
                query.country, query.province, query.district, method, query.weight
            )))
        },
    }
}
