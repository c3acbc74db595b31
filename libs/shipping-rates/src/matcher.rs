//! Rule matcher - selects the single most specific rule for a shipment
//!
//! Candidate filter: active, same country, province/district equal or
//! wildcard (empty), same method, weight inside the inclusive band.
//!
//! Tie-break, first difference wins:
//! 1. narrowest weight band
//! 2. explicit district over wildcard
//! 3. explicit province over wildcard
//! 4. lowest sheet row

use crate::types::{normalize_key, ShippingRule};
use std::cmp::Ordering;

/// Normalized lookup key for `find_best_rule`
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCriteria {
    pub country: String,
    pub province: String,
    pub district: String,
    pub method: String,
    pub weight: f64,
}

impl MatchCriteria {
    pub fn new(country: &str, province: &str, district: &str, method: &str, weight: f64) -> Self {
        Self {
            country: normalize_key(country),
            province: normalize_key(province),
            district: normalize_key(district),
            method: normalize_key(method),
            weight,
        }
    }
}

/// Empty rule value is a wildcard
fn field_matches(rule_value: &str, wanted: &str) -> bool {
    let rule_value = normalize_key(rule_value);
    rule_value.is_empty() || rule_value == wanted
}

fn is_candidate(rule: &ShippingRule, criteria: &MatchCriteria) -> bool {
    rule.active
        && normalize_key(&rule.country) == criteria.country
        && normalize_key(&rule.shipping_method) == criteria.method
        && field_matches(&rule.province, &criteria.province)
        && field_matches(&rule.district, &criteria.district)
        && rule.min_weight <= criteria.weight
        && criteria.weight <= rule.max_weight
}

/// Total order over candidates, most specific first
fn specificity(a: &ShippingRule, b: &ShippingRule) -> Ordering {
    a.weight_band()
        .total_cmp(&b.weight_band())
        .then_with(|| b.has_district().cmp(&a.has_district()))
        .then_with(|| b.has_province().cmp(&a.has_province()))
        .then_with(|| a.row_index.cmp(&b.row_index))
}

/// Pick the best matching rule, `None` when nothing applies
pub fn find_best_rule<'a>(
    rules: &'a [ShippingRule],
    criteria: &MatchCriteria,
) -> Option<&'a ShippingRule> {
    rules
        .iter()
        .filter(|rule| is_candidate(rule, criteria))
        .min_by(|a, b| specificity(a, b))
}
