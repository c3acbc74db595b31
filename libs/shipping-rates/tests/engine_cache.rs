//! Shipping rate engine cache and query tests
//!
//! Uses an in-memory table source that counts fetches per range.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use async_trait::async_trait;
use shipping_rates::{
    PriceQuery, RateError, RateSettings, Rows, ShippingRateEngine, SourceError, TableSource,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const RULES_RANGE: &str = "ShippingRules!A2:H1000";
const COUNTRIES_RANGE: &str = "CountryConfigs!A2:F300";

struct MemorySource {
    tables: Mutex<HashMap<String, Rows>>,
    fetches: Mutex<HashMap<String, usize>>,
    title_lookups: AtomicUsize,
    titles: Vec<String>,
    failing: AtomicBool,
    latency: Duration,
}

impl MemorySource {
    fn new(rules: Rows, countries: Rows) -> Self {
        let mut tables = HashMap::new();
        tables.insert(RULES_RANGE.to_string(), rules);
        tables.insert(COUNTRIES_RANGE.to_string(), countries);
        Self {
            tables: Mutex::new(tables),
            fetches: Mutex::new(HashMap::new()),
            title_lookups: AtomicUsize::new(0),
            titles: vec!["ShippingRules".to_string(), "CountryConfigs".to_string()],
            failing: AtomicBool::new(false),
            latency: Duration::ZERO,
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn set_rules(&self, rules: Rows) {
        self.tables
            .lock()
            .unwrap()
            .insert(RULES_RANGE.to_string(), rules);
    }

    fn fetches(&self, range: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(range)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TableSource for MemorySource {
    async fn fetch_values(&self, range: &str) -> Result<Rows, SourceError> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(range.to_string())
            .or_default() += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Api {
                status: 503,
                message: "The service is currently unavailable.".to_string(),
            });
        }

        self.tables
            .lock()
            .unwrap()
            .get(range)
            .cloned()
            .ok_or_else(|| SourceError::RangeParse {
                range: range.to_string(),
                message: format!("Unable to parse range: {}", range),
            })
    }

    async fn sheet_titles(&self) -> Result<Vec<String>, SourceError> {
        self.title_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.titles.clone())
    }
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}

fn vn_rules() -> Rows {
    vec![
        row(&["VN", "", "", "standard", "0", "5", "30000", "true"]),
        row(&["VN", "HCMC", "D1", "standard", "0", "5", "20000", "true"]),
        row(&["VN", "", "", "express", "0", "5", "60000"]),
    ]
}

fn countries() -> Rows {
    vec![
        row(&["VN", "Vietnam", "VND", "30000", "0.1", "500000"]),
        row(&["US", "United States", "USD", "15", "0.07", "100"]),
    ]
}

fn settings(ttl_ms: u64) -> RateSettings {
    RateSettings {
        cache_ttl: Duration::from_millis(ttl_ms),
        ..Default::default()
    }
}

fn engine_with(source: Arc<MemorySource>, ttl_ms: u64) -> ShippingRateEngine {
    ShippingRateEngine::new(settings(ttl_ms), source)
}

#[tokio::test]
async fn test_end_to_end_resolution() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source, 60_000);

    let query = PriceQuery::new("VN", 2.0)
        .with_province("HCMC")
        .with_district("D1")
        .with_method("standard");
    let matched = engine.get_price(&query).await.unwrap().unwrap();
    assert_eq!(matched.price, 20000.0);
    assert_eq!(matched.rule.row_index, 3);

    let query = PriceQuery::new("VN", 2.0)
        .with_province("HCMC")
        .with_district("Other")
        .with_method("standard");
    let matched = engine.get_price(&query).await.unwrap().unwrap();
    assert_eq!(matched.price, 30000.0);
    assert_eq!(matched.rule.row_index, 2);

    let query = PriceQuery::new("US", 2.0).with_method("standard");
    assert!(engine.get_price(&query).await.unwrap().is_none());
}

#[tokio::test]
async fn test_default_method_applied() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source, 60_000);

    let matched = engine
        .get_price(&PriceQuery::new("vn", 1.0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.rule.shipping_method, "standard");

    let matched = engine
        .get_price(&PriceQuery::new("VN", 1.0).with_method("EXPRESS"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.price, 60000.0);
}

#[tokio::test]
async fn test_unsupported_method_never_falls_back() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source.clone(), 60_000);

    let err = engine
        .get_price(&PriceQuery::new("VN", 1.0).with_method("drone"))
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    assert!(err.to_string().contains("standard, express"));
    assert!(matches!(err, RateError::UnsupportedMethod { .. }));
}

#[tokio::test]
async fn test_unsupported_default_method_rejected() {
    let rules = vec![row(&["VN", "", "", "overnight", "0", "5", "1", "true"])];
    let source = Arc::new(MemorySource::new(rules, countries()));
    let settings = RateSettings {
        default_method: "overnight".to_string(),
        supported_methods: vec!["standard".to_string()],
        ..Default::default()
    };
    let engine = ShippingRateEngine::new(settings, source.clone());

    let err = engine
        .get_price(&PriceQuery::new("VN", 1.0))
        .await
        .unwrap_err();
    match err {
        RateError::UnsupportedMethod { method, .. } => assert_eq!(method, "overnight"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(source.fetches(RULES_RANGE), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ensure_loaded_respects_ttl() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source.clone(), 1_000);

    engine.ensure_loaded().await.unwrap();
    engine.ensure_loaded().await.unwrap();
    assert_eq!(source.fetches(RULES_RANGE), 1);
    assert_eq!(engine.cache_meta().await.total_rules, 3);

    tokio::time::advance(Duration::from_millis(1_001)).await;
    engine.ensure_loaded().await.unwrap();
    assert_eq!(source.fetches(RULES_RANGE), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cache_reused_within_ttl() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source.clone(), 1_000);
    let query = PriceQuery::new("VN", 1.0);

    engine.get_price(&query).await.unwrap();
    assert_eq!(source.fetches(RULES_RANGE), 1);
    assert_eq!(source.fetches(COUNTRIES_RANGE), 1);

    tokio::time::advance(Duration::from_millis(500)).await;
    engine.get_price(&query).await.unwrap();
    engine.get_all_rules().await.unwrap();
    assert_eq!(source.fetches(RULES_RANGE), 1);

    tokio::time::advance(Duration::from_millis(600)).await;
    engine.get_price(&query).await.unwrap();
    assert_eq!(source.fetches(RULES_RANGE), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_load() {
    let source = Arc::new(
        MemorySource::new(vn_rules(), countries()).with_latency(Duration::from_millis(50)),
    );
    let engine = Arc::new(engine_with(source.clone(), 60_000));

    let callers = (0..16).map(|i| {
        let engine = engine.clone();
        async move {
            let query = PriceQuery::new("VN", f64::from(i % 5));
            engine.get_price(&query).await
        }
    });

    let results = futures::future::join_all(callers).await;
    assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));
    assert_eq!(source.fetches(RULES_RANGE), 1);
    assert_eq!(source.fetches(COUNTRIES_RANGE), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_failed_load() {
    let source = Arc::new(
        MemorySource::new(vn_rules(), countries()).with_latency(Duration::from_millis(50)),
    );
    source.failing.store(true, Ordering::SeqCst);
    let engine = Arc::new(engine_with(source.clone(), 60_000));

    let started = tokio::time::Instant::now();
    let callers = (0..16).map(|_| {
        let engine = engine.clone();
        async move { engine.get_price(&PriceQuery::new("VN", 1.0)).await }
    });

    let results = futures::future::join_all(callers).await;
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(RateError::Source(SourceError::Api { status: 503, .. })))));
    assert_eq!(source.fetches(RULES_RANGE), 1);
    assert!(started.elapsed() < Duration::from_millis(100));

    // The failure is not cached; the next caller tries again
    source.failing.store(false, Ordering::SeqCst);
    assert!(engine.get_price(&PriceQuery::new("VN", 1.0)).await.unwrap().is_some());
    assert_eq!(source.fetches(RULES_RANGE), 2);
}

#[tokio::test]
async fn test_rules_and_meta_from_one_snapshot() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source.clone(), 60_000);

    let (rules, meta) = engine.get_rules_with_meta().await.unwrap();
    assert_eq!(rules.len(), 3);
    assert_eq!(meta.total_rules, 3);
    assert_eq!(meta.total_country_configs, 2);
    assert!(meta.last_loaded_at.is_some());
}

#[tokio::test]
async fn test_failed_reload_keeps_snapshot() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source.clone(), 60_000);

    let before = engine.load_from_sheet().await.unwrap();
    assert_eq!(before.total_rules, 3);

    source.failing.store(true, Ordering::SeqCst);
    let err = engine.load_from_sheet().await.unwrap_err();
    assert_eq!(err.status_code(), 500);

    let after = engine.cache_meta().await;
    assert_eq!(after, before);
    assert_eq!(engine.get_all_rules().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_forced_reload_replaces_snapshot() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source.clone(), 60_000);

    assert_eq!(engine.get_all_rules().await.unwrap().len(), 3);

    source.set_rules(vec![row(&["TH", "", "", "standard", "0", "10", "100"])]);
    let meta = engine.load_from_sheet().await.unwrap();

    assert_eq!(meta.total_rules, 1);
    assert_eq!(meta.total_country_configs, 2);
    assert_eq!(meta.ttl_ms, 60_000);
    assert!(meta.expires_at.unwrap() > meta.last_loaded_at.unwrap());
    assert_eq!(source.fetches(RULES_RANGE), 2);

    let rules = engine.get_all_rules().await.unwrap();
    assert_eq!(rules[0].country, "TH");
}

#[tokio::test]
async fn test_tolerant_load() {
    let rules = vec![
        row(&["VN", "", "", "standard", "0", "5", "30000", "true"]),
        row(&["VN", "HCMC", "", "standard", "0", "5", "n/a", "true"]),
    ];
    let source = Arc::new(MemorySource::new(rules, countries()));
    let engine = engine_with(source, 60_000);

    let rules = engine.get_all_rules().await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].row_index, 2);
}

#[tokio::test]
async fn test_returned_rules_are_copies() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source, 60_000);

    let mut rules = engine.get_all_rules().await.unwrap();
    rules.clear();
    let mut configs = engine.get_country_configs().await.unwrap();
    configs[0].currency = "XXX".to_string();

    assert_eq!(engine.get_all_rules().await.unwrap().len(), 3);
    assert_eq!(engine.get_country_configs().await.unwrap()[0].currency, "VND");
}

#[tokio::test]
async fn test_country_config_lookup() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source, 60_000);

    let us = engine.get_country_config(" us ").await.unwrap().unwrap();
    assert_eq!(us.label, "United States");
    assert_eq!(us.free_shipping_threshold, 100.0);
    assert!(engine.get_country_config("JP").await.unwrap().is_none());
}

#[tokio::test]
async fn test_renamed_tab_recovered_during_load() {
    let mut source = MemorySource::new(Vec::new(), countries());
    source.titles = vec!["Shipping Rules".to_string(), "CountryConfigs".to_string()];
    source
        .tables
        .lock()
        .unwrap()
        .insert("'Shipping Rules'!A2:H1000".to_string(), vn_rules());
    let source = Arc::new(source);

    let settings = RateSettings {
        rules_range: "shipping_rules!A2:H1000".to_string(),
        ..settings(60_000)
    };
    let engine = ShippingRateEngine::new(settings, source.clone());

    assert_eq!(engine.get_all_rules().await.unwrap().len(), 3);
    assert_eq!(source.fetches("shipping_rules!A2:H1000"), 1);
    assert_eq!(source.fetches("'Shipping Rules'!A2:H1000"), 1);
    assert_eq!(source.title_lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_meta_does_not_load() {
    let source = Arc::new(MemorySource::new(vn_rules(), countries()));
    let engine = engine_with(source.clone(), 60_000);

    let meta = engine.cache_meta().await;
    assert!(meta.last_loaded_at.is_none());
    assert_eq!(source.fetches(RULES_RANGE), 0);
}
