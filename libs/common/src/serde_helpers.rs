//! Shared Serde helpers
//!
//! Query strings deliver every value as text, so optional fields need to
//! treat `""` as absent. Supported input formats:
//! - `null` → None
//! - `""` (empty or blank string) → None
//! - String number `"2.5"` → Some(2.5)
//! - Native number `2.5` → Some(2.5)

use serde::{Deserialize, Deserializer};

// ============================================================================
// Default Value Functions (for serde #[serde(default = "...")] attributes)
// ============================================================================

/// Default value: true
pub fn bool_true() -> bool {
    true
}

/// Default value: false
pub fn bool_false() -> bool {
    false
}

// ============================================================================
// Custom Deserializers
// ============================================================================

/// Deserialize optional f64
///
/// # Example
/// ```ignore
/// #[derive(Deserialize)]
/// struct PriceParams {
///     #[serde(default, deserialize_with = "deserialize_optional_f64")]
///     weight: Option<f64>,
/// }
/// ```
pub fn deserialize_optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
        Null,
    }

    match Option::<StringOrFloat>::deserialize(deserializer)? {
        None | Some(StringOrFloat::Null) => Ok(None),
        Some(StringOrFloat::String(s)) if s.trim().is_empty() => Ok(None),
        Some(StringOrFloat::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid number: {}", s))),
        Some(StringOrFloat::Float(v)) => Ok(Some(v)),
    }
}

/// Deserialize optional string, blank strings become `None`
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
