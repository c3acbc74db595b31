//! Range resolver - recovers from renamed spreadsheet tabs
//!
//! Spreadsheet owners rename tabs with cosmetic differences ("Shipping Rules"
//! vs "shipping_rules"). When the Sheets API rejects a range as unparseable,
//! the configured tab name is fuzzy-matched against the real tab titles and
//! the fetch is retried exactly once with the corrected range.

use crate::error::SourceError;
use crate::source::{Rows, TableSource};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

static SEPARATOR_RUNS: OnceLock<Regex> = OnceLock::new();

#[allow(clippy::expect_used)] // Static pattern
fn separator_runs() -> &'static Regex {
    SEPARATOR_RUNS.get_or_init(|| Regex::new(r"[\s_\-]+").expect("separator pattern is valid"))
}

/// Split `Sheet!A1:B2` into the sheet name and the cell part
///
/// Returns `None` when the range has no sheet-name prefix.
pub fn split_sheet_range(range: &str) -> Option<(&str, &str)> {
    let (sheet, cells) = range.rsplit_once('!')?;
    if sheet.trim().is_empty() {
        return None;
    }
    Some((sheet, cells))
}

/// Comparison form of a tab name: unquoted, separators collapsed, lowercase
pub fn normalize_sheet_name(name: &str) -> String {
    let unquoted: String = name.chars().filter(|c| *c != '\'' && *c != '"').collect();
    separator_runs()
        .replace_all(&unquoted, " ")
        .trim()
        .to_lowercase()
}

/// Quote a tab title for use in an A1 range when it needs it
pub fn quote_sheet_name(title: &str) -> String {
    if title.chars().any(char::is_whitespace) || title.contains('\'') {
        format!("'{}'", title.replace('\'', "''"))
    } else {
        title.to_string()
    }
}

/// First sheet row covered by a range (`Rules!A2:H100` -> 2), 1 when open-ended
pub fn range_start_row(range: &str) -> usize {
    let cells = split_sheet_range(range).map_or(range, |(_, cells)| cells);
    let first_cell = cells.split(':').next().unwrap_or("");
    first_cell
        .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '$')
        .parse::<usize>()
        .ok()
        .filter(|row| *row > 0)
        .unwrap_or(1)
}

/// Find the tab title matching `configured` after normalization
pub fn resolve_sheet_title<'a>(configured: &str, titles: &'a [String]) -> Option<&'a str> {
    let wanted = normalize_sheet_name(configured);
    titles
        .iter()
        .find(|title| normalize_sheet_name(title) == wanted)
        .map(String::as_str)
}

/// Fetch a range, retrying once with a corrected tab name on range-parse errors
///
/// Any other failure, or a failed recovery, propagates the original error.
pub async fn fetch_with_range_fallback(
    source: &dyn TableSource,
    range: &str,
) -> Result<Rows, SourceError> {
    let original = match source.fetch_values(range).await {
        Ok(rows) => return Ok(rows),
        Err(e) => e,
    };

    if !original.is_range_parse() {
        return Err(original);
    }

    let Some((sheet, cells)) = split_sheet_range(range) else {
        debug!("Range {} has no sheet prefix, nothing to resolve", range);
        return Err(original);
    };

    warn!("Sheets API could not parse range {}, resolving tab name", range);

    let titles = match source.sheet_titles().await {
        Ok(titles) => titles,
        Err(e) => {
            warn!("Failed to list sheet titles for range recovery: {}", e);
            return Err(original);
        },
    };

    let Some(title) = resolve_sheet_title(sheet, &titles) else {
        warn!(
            "No tab matches '{}' (available: {})",
            sheet,
            titles.join(", ")
        );
        return Err(original);
    };

    let corrected = format!("{}!{}", quote_sheet_name(title), cells);
    info!("Retrying with corrected range {} (was {})", corrected, range);
    source.fetch_values(&corrected).await
}
