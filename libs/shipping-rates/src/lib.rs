//! Shipping Rates - Rate Resolution Engine Library
//!
//! Resolves the shipping rate for a shipment from rules kept in a Google
//! Sheets spreadsheet:
//! - Rule and country-default loading through the Sheets v4 REST API
//! - Recovery from renamed tabs (one corrected retry)
//! - Tolerant row parsing, malformed rows are logged and dropped
//! - TTL cache with single-flight reloads
//! - Specificity-based rule matching
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  get_price   │────▶│  TTL cache   │────▶│Range resolver│
//! │  (engine)    │     │ (load gate)  │     │ (1 retry)    │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!        │                   │                     │
//!        ▼                   ▼                     ▼
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Matcher    │     │  Row parser  │     │ TableSource  │
//! │ (tie-break)  │     │ (filter_map) │     │ (Sheets API) │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

pub mod credentials;
mod engine;
mod error;
mod matcher;
mod parser;
pub mod range_resolver;
mod sheets;
mod source;
pub mod types;

// Re-export public API
pub use credentials::{Credentials, ServiceAccountKey, TokenProvider};
pub use engine::ShippingRateEngine;
pub use error::{RateError, Result, SourceError};
pub use matcher::{find_best_rule, MatchCriteria};
pub use parser::{parse_country_row, parse_country_rows, parse_rule_row, parse_rule_rows};
pub use range_resolver::fetch_with_range_fallback;
pub use sheets::{
    GoogleSheetsSource, SheetsSettings, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use source::{Rows, TableSource};

// Re-export data types for convenience
pub use types::{
    parse_method_list, CacheMeta, CountryConfig, PriceMatch, PriceQuery, RateSettings,
    ShippingRule,
};
