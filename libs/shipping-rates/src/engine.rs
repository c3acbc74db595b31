//! Shipping rate engine - TTL cache, load coordination and query surface
//!
//! The rule and country tables are held as one immutable snapshot behind an
//! `RwLock<Arc<..>>`. Readers clone the `Arc` and never observe a partial
//! reload. Reloads go through a single load gate and re-check staleness once
//! inside it, so any number of callers hitting a stale cache cause one fetch.
//! Callers that queued behind a load take its outcome, failure included,
//! instead of fetching again.

use crate::error::{RateError, Result};
use crate::matcher::{find_best_rule, MatchCriteria};
use crate::parser::{parse_country_rows, parse_rule_rows};
use crate::range_resolver::{fetch_with_range_fallback, range_start_row};
use crate::source::TableSource;
use crate::types::{
    normalize_key, CacheMeta, CountryConfig, PriceMatch, PriceQuery, RateSettings, ShippingRule,
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One complete load of both tables
#[derive(Debug, Default)]
struct CacheSnapshot {
    rules: Vec<ShippingRule>,
    country_configs: Vec<CountryConfig>,
    /// Monotonic load time, drives expiry
    loaded_at: Option<Instant>,
    /// Wall-clock load time, for reporting only
    loaded_at_utc: Option<DateTime<Utc>>,
}

/// Outcome of the most recent load, guarded by the load gate
#[derive(Debug, Default)]
struct LoadState {
    last_error: Option<RateError>,
}

/// Shipping rate engine shared by all request handlers
pub struct ShippingRateEngine {
    settings: RateSettings,
    source: Arc<dyn TableSource>,
    snapshot: RwLock<Arc<CacheSnapshot>>,
    load_gate: Mutex<LoadState>,
    /// Completed load attempts, successful or not
    loads_completed: AtomicU64,
}

impl ShippingRateEngine {
    /// Create an engine with an empty cache; nothing is fetched until first use
    pub fn new(mut settings: RateSettings, source: Arc<dyn TableSource>) -> Self {
        settings.default_method = normalize_key(&settings.default_method);
        settings.supported_methods = settings
            .supported_methods
            .iter()
            .map(|m| normalize_key(m))
            .filter(|m| !m.is_empty())
            .collect();

        Self {
            settings,
            source,
            snapshot: RwLock::new(Arc::new(CacheSnapshot::default())),
            load_gate: Mutex::new(LoadState::default()),
            loads_completed: AtomicU64::new(0),
        }
    }

    pub fn currency(&self) -> &str {
        &self.settings.currency
    }

    pub fn default_method(&self) -> &str {
        &self.settings.default_method
    }

    pub fn supported_methods(&self) -> &[String] {
        &self.settings.supported_methods
    }

    async fn current(&self) -> Arc<CacheSnapshot> {
        self.snapshot.read().await.clone()
    }

    fn is_stale(&self, snapshot: &CacheSnapshot) -> bool {
        if snapshot.rules.is_empty() {
            return true;
        }
        match snapshot.loaded_at {
            Some(loaded_at) => loaded_at.elapsed() > self.settings.cache_ttl,
            None => true,
        }
    }

    /// Reload when the cache is empty or expired, otherwise a no-op
    pub async fn ensure_loaded(&self) -> Result<()> {
        self.fresh_snapshot().await.map(|_| ())
    }

    async fn fresh_snapshot(&self) -> Result<Arc<CacheSnapshot>> {
        let snapshot = self.current().await;
        if !self.is_stale(&snapshot) {
            return Ok(snapshot);
        }

        let seen = self.loads_completed.load(Ordering::Acquire);
        let mut gate = self.load_gate.lock().await;

        // A load finished while we waited: share its result
        if self.loads_completed.load(Ordering::Acquire) != seen {
            if let Some(err) = &gate.last_error {
                debug!("Sharing failure of a concurrent shipping rate load");
                return Err(err.clone());
            }
            debug!("Shipping rate cache refreshed by a concurrent load");
            return Ok(self.current().await);
        }

        let snapshot = self.current().await;
        if !self.is_stale(&snapshot) {
            return Ok(snapshot);
        }

        self.reload(&mut gate).await
    }

    /// Forced reload ignoring the TTL
    pub async fn load_from_sheet(&self) -> Result<CacheMeta> {
        let mut gate = self.load_gate.lock().await;
        let snapshot = self.reload(&mut gate).await?;
        Ok(self.meta_for(&snapshot))
    }

    /// Run one load attempt and publish its outcome to queued callers
    async fn reload(&self, gate: &mut LoadState) -> Result<Arc<CacheSnapshot>> {
        let result = self.fetch_snapshot().await;
        gate.last_error = result.as_ref().err().cloned();
        self.loads_completed.fetch_add(1, Ordering::Release);
        result
    }

    /// Fetch both tables and swap the snapshot
    async fn fetch_snapshot(&self) -> Result<Arc<CacheSnapshot>> {
        let started = Instant::now();
        let rules_range = self.settings.rules_range.as_str();
        let countries_range = self.settings.countries_range.as_str();

        let fetched = tokio::try_join!(
            fetch_with_range_fallback(self.source.as_ref(), rules_range),
            fetch_with_range_fallback(self.source.as_ref(), countries_range),
        );

        let (rule_rows, country_rows) = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Shipping rate reload failed, keeping previous cache: {}", e);
                return Err(RateError::from(e));
            },
        };

        let snapshot = Arc::new(CacheSnapshot {
            rules: parse_rule_rows(&rule_rows, range_start_row(rules_range)),
            country_configs: parse_country_rows(&country_rows, range_start_row(countries_range)),
            loaded_at: Some(Instant::now()),
            loaded_at_utc: Some(Utc::now()),
        });

        *self.snapshot.write().await = snapshot.clone();

        info!(
            "Loaded {} shipping rules and {} country configs in {}ms",
            snapshot.rules.len(),
            snapshot.country_configs.len(),
            started.elapsed().as_millis()
        );
        Ok(snapshot)
    }

    /// Default method when absent or blank; the result must be supported
    fn resolve_method(&self, requested: Option<&str>) -> Result<String> {
        let method = requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.settings.default_method.as_str());

        let normalized = normalize_key(method);
        if self.settings.supported_methods.contains(&normalized) {
            Ok(normalized)
        } else {
            Err(RateError::UnsupportedMethod {
                method: method.to_string(),
                supported: self.settings.supported_methods.clone(),
            })
        }
    }

    /// Resolve the rate for a shipment, `Ok(None)` when no rule applies
    pub async fn get_price(&self, query: &PriceQuery) -> Result<Option<PriceMatch>> {
        let method = self.resolve_method(query.method.as_deref())?;
        let snapshot = self.fresh_snapshot().await?;

        let criteria = MatchCriteria::new(
            &query.country,
            &query.province,
            &query.district,
            &method,
            query.weight,
        );

        let matched = find_best_rule(&snapshot.rules, &criteria).map(|rule| PriceMatch {
            price: rule.price,
            rule: rule.clone(),
        });

        match &matched {
            Some(m) => debug!(
                "Matched rule row {} for {}/{}/{} {} {}kg",
                m.rule.row_index,
                query.country,
                query.province,
                query.district,
                method,
                query.weight
            ),
            None => debug!(
                "No shipping rule for {}/{}/{} {} {}kg",
                query.country, query.province, query.district, method, query.weight
            ),
        }

        Ok(matched)
    }

    pub async fn get_all_rules(&self) -> Result<Vec<ShippingRule>> {
        Ok(self.fresh_snapshot().await?.rules.clone())
    }

    /// All rules plus the metadata of the snapshot they were read from
    pub async fn get_rules_with_meta(&self) -> Result<(Vec<ShippingRule>, CacheMeta)> {
        let snapshot = self.fresh_snapshot().await?;
        Ok((snapshot.rules.clone(), self.meta_for(&snapshot)))
    }

    pub async fn get_country_configs(&self) -> Result<Vec<CountryConfig>> {
        Ok(self.fresh_snapshot().await?.country_configs.clone())
    }

    /// Country defaults by code, case-insensitive
    pub async fn get_country_config(&self, code: &str) -> Result<Option<CountryConfig>> {
        let code = code.trim();
        let snapshot = self.fresh_snapshot().await?;
        Ok(snapshot
            .country_configs
            .iter()
            .find(|c| c.country_code.trim().eq_ignore_ascii_case(code))
            .cloned())
    }

    /// Cache metadata, never triggers a load
    pub async fn cache_meta(&self) -> CacheMeta {
        let snapshot = self.current().await;
        self.meta_for(&snapshot)
    }

    fn meta_for(&self, snapshot: &CacheSnapshot) -> CacheMeta {
        let ttl = self.settings.cache_ttl;
        let expires_at = snapshot.loaded_at_utc.and_then(|loaded| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| loaded.checked_add_signed(ttl))
        });

        CacheMeta {
            last_loaded_at: snapshot.loaded_at_utc,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            expires_at,
            total_rules: snapshot.rules.len(),
            total_country_configs: snapshot.country_configs.len(),
        }
    }
}
