//! ratesrv configuration
//!
//! Layered with figment: built-in defaults, then the YAML file, then
//! `RATESRV_` environment variables (`__` separates sections).

use common::logging::LogConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use shipping_rates::types::{
    DEFAULT_CACHE_TTL_MS, DEFAULT_COUNTRIES_RANGE, DEFAULT_CURRENCY, DEFAULT_METHOD,
    DEFAULT_RULES_RANGE, DEFAULT_SUPPORTED_METHODS,
};
use shipping_rates::{
    parse_method_list, Credentials, RateSettings, SheetsSettings, DEFAULT_API_BASE_URL,
    DEFAULT_REQUEST_TIMEOUT_MS,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SERVICE_NAME: &str = "ratesrv";
pub const DEFAULT_CONFIG_PATH: &str = "config/ratesrv.yaml";
pub const ENV_PREFIX: &str = "RATESRV_";
pub const DEFAULT_PORT: u16 = 6010;

/// Standard env var pointing at a service-account keyfile
const ADC_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: SERVICE_NAME.to_string(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
    pub dir: PathBuf,
    pub file: bool,
    pub json: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: PathBuf::from("logs"),
            file: false,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSection {
    /// Empty is allowed at startup; lookups then fail with a configuration error
    pub sheet_id: String,
    pub rules_range: String,
    pub countries_range: String,
    pub credentials_json: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub api_base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for SheetsSection {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            rules_range: DEFAULT_RULES_RANGE.to_string(),
            countries_range: DEFAULT_COUNTRIES_RANGE.to_string(),
            credentials_json: None,
            credentials_file: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesSection {
    pub cache_ttl_ms: u64,
    pub currency: String,
    pub default_method: String,
    /// Comma-separated method keys
    pub supported_methods: String,
    /// Load the sheet before accepting requests; failures are only logged
    pub preload_on_start: bool,
}

impl Default for RatesSection {
    fn default() -> Self {
        Self {
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            currency: DEFAULT_CURRENCY.to_string(),
            default_method: DEFAULT_METHOD.to_string(),
            supported_methods: DEFAULT_SUPPORTED_METHODS.to_string(),
            preload_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceSection,
    pub log: LogSection,
    pub sheets: SheetsSection,
    pub rates: RatesSection,
}

impl Config {
    /// Load from `path` (or the default location when it exists) plus env overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.port == 0 {
            return Err(ConfigError::Invalid("service.port must not be 0".to_string()));
        }
        if self.rates.cache_ttl_ms == 0 {
            return Err(ConfigError::Invalid(
                "rates.cache_ttl_ms must be greater than 0".to_string(),
            ));
        }
        if self.rates.currency.trim().is_empty() {
            return Err(ConfigError::Invalid("rates.currency must not be empty".to_string()));
        }

        let methods = parse_method_list(&self.rates.supported_methods);
        if methods.is_empty() {
            return Err(ConfigError::Invalid(
                "rates.supported_methods must list at least one method".to_string(),
            ));
        }

        let default_method = self.rates.default_method.trim().to_lowercase();
        if !methods.contains(&default_method) {
            return Err(ConfigError::Invalid(format!(
                "rates.default_method '{}' is not in supported_methods ({})",
                self.rates.default_method,
                methods.join(", ")
            )));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            service_name: self.service.name.clone(),
            log_dir: self.log.dir.clone(),
            level: self.log.level.clone(),
            enable_file: self.log.file,
            enable_json: self.log.json,
        }
    }

    pub fn rate_settings(&self) -> RateSettings {
        RateSettings {
            rules_range: self.sheets.rules_range.clone(),
            countries_range: self.sheets.countries_range.clone(),
            cache_ttl: Duration::from_millis(self.rates.cache_ttl_ms),
            currency: self.rates.currency.trim().to_string(),
            default_method: self.rates.default_method.clone(),
            supported_methods: parse_method_list(&self.rates.supported_methods),
        }
    }

    /// Credentials by precedence: inline JSON, keyfile, `GOOGLE_APPLICATION_CREDENTIALS`
    pub fn credentials(&self) -> Credentials {
        let key_file = self
            .sheets
            .credentials_file
            .clone()
            .or_else(|| std::env::var_os(ADC_ENV).map(PathBuf::from));
        Credentials::from_options(self.sheets.credentials_json.as_deref(), key_file.as_deref())
    }

    pub fn sheets_settings(&self) -> SheetsSettings {
        SheetsSettings {
            spreadsheet_id: self.sheets.sheet_id.trim().to_string(),
            api_base_url: self.sheets.api_base_url.clone(),
            credentials: self.credentials(),
            request_timeout: Duration::from_millis(self.sheets.request_timeout_ms),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:6010");

        let settings = config.rate_settings();
        assert_eq!(settings.cache_ttl, Duration::from_millis(300_000));
        assert_eq!(settings.supported_methods, vec!["standard", "express"]);
    }

    #[test]
    fn test_yaml_then_env_layering() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join("config")).unwrap();
            jail.create_file(
                "config/ratesrv.yaml",
                r#"
service:
  port: 7010
sheets:
  sheet_id: from-yaml
  rules_range: "Rules!A2:H"
rates:
  currency: USD
  supported_methods: "standard,express,same-day"
"#,
            )?;
            jail.set_env("RATESRV_SHEETS__SHEET_ID", "from-env");
            jail.set_env("RATESRV_RATES__CACHE_TTL_MS", "1000");

            let config = Config::load(None).unwrap();
            assert_eq!(config.service.port, 7010);
            assert_eq!(config.service.host, "0.0.0.0");
            assert_eq!(config.sheets.sheet_id, "from-env");
            assert_eq!(config.sheets.rules_range, "Rules!A2:H");
            assert_eq!(config.sheets.countries_range, DEFAULT_COUNTRIES_RANGE);
            assert_eq!(config.rates.currency, "USD");
            assert_eq!(config.rates.cache_ttl_ms, 1000);
            assert_eq!(
                config.rate_settings().supported_methods,
                vec!["standard", "express", "same-day"]
            );
            Ok(())
        });
    }

    #[test]
    fn test_missing_default_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();
            assert_eq!(config.service.port, DEFAULT_PORT);
            assert!(config.sheets.sheet_id.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/ratesrv.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_validation_rejections() {
        let mut config = Config::default();
        config.service.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rates.cache_ttl_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rates.currency = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rates.supported_methods = " , ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rates.default_method = "overnight".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overnight"));

        // Method comparison ignores case
        let mut config = Config::default();
        config.rates.default_method = "Express".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credentials_precedence() {
        Jail::expect_with(|jail| {
            jail.set_env(ADC_ENV, "/var/run/adc.json");

            let mut config = Config::default();
            assert!(matches!(
                config.credentials(),
                Credentials::KeyFile(path) if path == Path::new("/var/run/adc.json")
            ));

            config.sheets.credentials_file = Some(PathBuf::from("/etc/ratesrv/sa.json"));
            assert!(matches!(
                config.credentials(),
                Credentials::KeyFile(path) if path == Path::new("/etc/ratesrv/sa.json")
            ));

            config.sheets.credentials_json = Some("{\"client_email\":\"x\"}".to_string());
            assert!(matches!(config.credentials(), Credentials::Inline(_)));
            Ok(())
        });
    }
}
