//! Row parser - converts raw sheet rows into typed records
//!
//! Parsing is tolerant: a malformed row is logged and dropped, never fatal.
//! Rule rows require every pricing column; country rows only require their
//! identifying strings and fall back to 0 for numbers.

use crate::types::{CountryConfig, ShippingRule};
use tracing::{debug, info, warn};

/// Rule table columns, in sheet order
const RULE_COUNTRY: usize = 0;
const RULE_PROVINCE: usize = 1;
const RULE_DISTRICT: usize = 2;
const RULE_METHOD: usize = 3;
const RULE_MIN_WEIGHT: usize = 4;
const RULE_MAX_WEIGHT: usize = 5;
const RULE_PRICE: usize = 6;
const RULE_ACTIVE: usize = 7;

/// Country table columns, in sheet order
const COUNTRY_CODE: usize = 0;
const COUNTRY_LABEL: usize = 1;
const COUNTRY_CURRENCY: usize = 2;
const COUNTRY_SHIPPING_COST: usize = 3;
const COUNTRY_TAX_RATE: usize = 4;
const COUNTRY_FREE_THRESHOLD: usize = 5;

/// Trimmed cell text; the Sheets API omits trailing empty cells
fn cell(columns: &[String], index: usize) -> &str {
    columns.get(index).map(|s| s.trim()).unwrap_or("")
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse one rule row, `None` when the row must be dropped
pub fn parse_rule_row(columns: &[String], row_index: usize) -> Option<ShippingRule> {
    let country = cell(columns, RULE_COUNTRY);
    let method = cell(columns, RULE_METHOD);
    let min_raw = cell(columns, RULE_MIN_WEIGHT);
    let max_raw = cell(columns, RULE_MAX_WEIGHT);
    let price_raw = cell(columns, RULE_PRICE);

    if country.is_empty()
        || method.is_empty()
        || min_raw.is_empty()
        || max_raw.is_empty()
        || price_raw.is_empty()
    {
        debug!("Skipping rule row {}: missing required column", row_index);
        return None;
    }

    let (min_weight, max_weight, price) = match (
        parse_number(min_raw),
        parse_number(max_raw),
        parse_number(price_raw),
    ) {
        (Some(min), Some(max), Some(price)) => (min, max, price),
        _ => {
            warn!(
                row = row_index,
                min_weight = %min_raw,
                max_weight = %max_raw,
                price = %price_raw,
                "Dropping rule row {}: non-numeric weight or price",
                row_index
            );
            return None;
        },
    };

    if min_weight > max_weight {
        warn!(
            row = row_index,
            min_weight, max_weight, "Dropping rule row {}: min weight above max weight", row_index
        );
        return None;
    }

    Some(ShippingRule {
        country: country.to_string(),
        province: cell(columns, RULE_PROVINCE).to_string(),
        district: cell(columns, RULE_DISTRICT).to_string(),
        shipping_method: method.to_string(),
        min_weight,
        max_weight,
        price,
        active: !cell(columns, RULE_ACTIVE).eq_ignore_ascii_case("false"),
        row_index,
    })
}

/// Parse one country row, `None` when an identifying column is blank
pub fn parse_country_row(columns: &[String], row_index: usize) -> Option<CountryConfig> {
    let country_code = cell(columns, COUNTRY_CODE);
    let label = cell(columns, COUNTRY_LABEL);
    let currency = cell(columns, COUNTRY_CURRENCY);

    if country_code.is_empty() || label.is_empty() || currency.is_empty() {
        debug!(
            "Skipping country row {}: code, label and currency are required",
            row_index
        );
        return None;
    }

    let number_or_zero = |index: usize| {
        let raw = cell(columns, index);
        match parse_number(raw) {
            Some(value) => value,
            None => {
                if !raw.is_empty() {
                    warn!(
                        row = row_index,
                        value = %raw,
                        "Country row {} has a non-numeric value, using 0",
                        row_index
                    );
                }
                0.0
            },
        }
    };

    Some(CountryConfig {
        country_code: country_code.to_string(),
        label: label.to_string(),
        currency: currency.to_string(),
        shipping_cost: number_or_zero(COUNTRY_SHIPPING_COST),
        tax_rate: number_or_zero(COUNTRY_TAX_RATE),
        free_shipping_threshold: number_or_zero(COUNTRY_FREE_THRESHOLD),
        row_index,
    })
}

/// Parse a whole rule table whose first row sits at `first_row`
pub fn parse_rule_rows(rows: &[Vec<String>], first_row: usize) -> Vec<ShippingRule> {
    let rules: Vec<ShippingRule> = rows
        .iter()
        .enumerate()
        .filter_map(|(offset, columns)| parse_rule_row(columns, first_row + offset))
        .collect();

    info!(
        "Parsed {} shipping rules ({} rows dropped)",
        rules.len(),
        rows.len() - rules.len()
    );
    rules
}

/// Parse a whole country table whose first row sits at `first_row`
pub fn parse_country_rows(rows: &[Vec<String>], first_row: usize) -> Vec<CountryConfig> {
    let configs: Vec<CountryConfig> = rows
        .iter()
        .enumerate()
        .filter_map(|(offset, columns)| parse_country_row(columns, first_row + offset))
        .collect();

    info!(
        "Parsed {} country configs ({} rows dropped)",
        configs.len(),
        rows.len() - configs.len()
    );
    configs
}
