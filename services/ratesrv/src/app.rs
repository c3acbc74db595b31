//! Application state and initialization logic

use crate::config::Config;
use anyhow::Context;
use shipping_rates::{GoogleSheetsSource, ShippingRateEngine, TableSource};
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across all handlers
pub struct AppState {
    pub engine: Arc<ShippingRateEngine>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State over an arbitrary table source
    pub fn with_source(config: Config, source: Arc<dyn TableSource>) -> Arc<Self> {
        let engine = ShippingRateEngine::new(config.rate_settings(), source);
        Arc::new(Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        })
    }
}

/// Create application state backed by the configured spreadsheet
pub fn create_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    if config.sheets.sheet_id.trim().is_empty() {
        warn!("sheets.sheet_id is not set, shipping lookups will fail until it is configured");
    }

    let source = GoogleSheetsSource::new(config.sheets_settings())
        .context("Failed to create Sheets API client")?;

    info!(
        "Shipping rates from sheet '{}' ({} / {}), cache TTL {}ms",
        source.spreadsheet_id(),
        config.sheets.rules_range,
        config.sheets.countries_range,
        config.rates.cache_ttl_ms
    );

    Ok(AppState::with_source(config, Arc::new(source)))
}

/// Warm the cache before serving; a failure only costs the first request a load
pub async fn preload(state: &AppState) {
    match state.engine.load_from_sheet().await {
        Ok(meta) => info!(
            "Preloaded {} shipping rules and {} country configs",
            meta.total_rules, meta.total_country_configs
        ),
        Err(e) => warn!("Shipping rate preload failed, continuing: {}", e),
    }
}
