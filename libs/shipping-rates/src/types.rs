//! Shipping rate data types
//!
//! Weights are kilograms and prices are major units of the configured
//! currency. The engine only compares them, so any consistent unit works.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One row of the rate table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingRule {
    pub country: String,
    /// Empty means "any province"
    pub province: String,
    /// Empty means "any district"
    pub district: String,
    pub shipping_method: String,
    /// Inclusive lower weight bound
    pub min_weight: f64,
    /// Inclusive upper weight bound
    pub max_weight: f64,
    pub price: f64,
    pub active: bool,
    /// 1-based sheet row the rule was read from
    pub row_index: usize,
}

impl ShippingRule {
    /// Width of the weight band, smaller is more specific
    pub fn weight_band(&self) -> f64 {
        self.max_weight - self.min_weight
    }

    pub fn has_province(&self) -> bool {
        !self.province.trim().is_empty()
    }

    pub fn has_district(&self) -> bool {
        !self.district.trim().is_empty()
    }
}

/// One row of the country defaults table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryConfig {
    pub country_code: String,
    pub label: String,
    pub currency: String,
    pub shipping_cost: f64,
    pub tax_rate: f64,
    pub free_shipping_threshold: f64,
    pub row_index: usize,
}

/// Shipment request resolved against the rule table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub country: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub district: String,
    pub weight: f64,
    /// Falls back to the configured default method when absent or blank
    #[serde(default)]
    pub method: Option<String>,
}

impl PriceQuery {
    pub fn new(country: impl Into<String>, weight: f64) -> Self {
        Self {
            country: country.into(),
            weight,
            ..Default::default()
        }
    }

    pub fn with_province(mut self, province: impl Into<String>) -> Self {
        self.province = province.into();
        self
    }

    pub fn with_district(mut self, district: impl Into<String>) -> Self {
        self.district = district.into();
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

/// The single rule selected for a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMatch {
    pub price: f64,
    pub rule: ShippingRule,
}

/// Cache observability snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMeta {
    pub last_loaded_at: Option<DateTime<Utc>>,
    pub ttl_ms: u64,
    /// None until the first successful load
    pub expires_at: Option<DateTime<Utc>>,
    pub total_rules: usize,
    pub total_country_configs: usize,
}

/// Static engine settings
#[derive(Debug, Clone)]
pub struct RateSettings {
    /// Rule table range, e.g. `ShippingRules!A2:H1000`
    pub rules_range: String,
    /// Country defaults range, e.g. `CountryConfigs!A2:F300`
    pub countries_range: String,
    pub cache_ttl: Duration,
    pub currency: String,
    pub default_method: String,
    pub supported_methods: Vec<String>,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            rules_range: DEFAULT_RULES_RANGE.to_string(),
            countries_range: DEFAULT_COUNTRIES_RANGE.to_string(),
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            currency: DEFAULT_CURRENCY.to_string(),
            default_method: DEFAULT_METHOD.to_string(),
            supported_methods: parse_method_list(DEFAULT_SUPPORTED_METHODS),
        }
    }
}

pub const DEFAULT_RULES_RANGE: &str = "ShippingRules!A2:H1000";
pub const DEFAULT_COUNTRIES_RANGE: &str = "CountryConfigs!A2:F300";
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
pub const DEFAULT_CURRENCY: &str = "VND";
pub const DEFAULT_METHOD: &str = "standard";
pub const DEFAULT_SUPPORTED_METHODS: &str = "standard,express";

/// Split a comma-separated method list, dropping blanks and duplicates
pub fn parse_method_list(raw: &str) -> Vec<String> {
    let mut methods: Vec<String> = Vec::new();
    for method in raw.split(',').map(normalize_key) {
        if !method.is_empty() && !methods.contains(&method) {
            methods.push(method);
        }
    }
    methods
}

/// Trim + lowercase, the comparison form for every matched string
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_list() {
        assert_eq!(
            parse_method_list(" Standard, express,,STANDARD ,same-day"),
            vec!["standard", "express", "same-day"]
        );
        assert!(parse_method_list(" , ").is_empty());
    }

    #[test]
    fn test_rule_specificity_helpers() {
        let rule = ShippingRule {
            country: "VN".to_string(),
            province: "  ".to_string(),
            district: "D1".to_string(),
            shipping_method: "standard".to_string(),
            min_weight: 1.0,
            max_weight: 3.5,
            price: 10.0,
            active: true,
            row_index: 2,
        };
        assert!(!rule.has_province());
        assert!(rule.has_district());
        assert_eq!(rule.weight_band(), 2.5);
    }
}
