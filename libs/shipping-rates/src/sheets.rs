//! Google Sheets v4 table source
//!
//! Reads cell values with `spreadsheets.values.get` and tab titles with a
//! field-masked `spreadsheets.get`. Credentials are resolved on first use so
//! a misconfigured deployment still starts and reports the problem per call.

use crate::credentials::{Credentials, TokenProvider};
use crate::error::SourceError;
use crate::source::{Rows, TableSource};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Connection settings for a spreadsheet
#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    pub api_base_url: String,
    pub credentials: Credentials,
    pub request_timeout: Duration,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            credentials: Credentials::Missing,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Sheets REST client implementing `TableSource`
pub struct GoogleSheetsSource {
    settings: SheetsSettings,
    client: Client,
    tokens: OnceCell<TokenProvider>,
}

impl GoogleSheetsSource {
    pub fn new(settings: SheetsSettings) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            settings,
            client,
            tokens: OnceCell::new(),
        })
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.settings.spreadsheet_id
    }

    async fn bearer_token(&self) -> Result<String, SourceError> {
        let provider = self
            .tokens
            .get_or_try_init(|| async {
                TokenProvider::from_credentials(&self.settings.credentials)
            })
            .await?;
        provider.access_token(&self.client).await
    }

    /// `{base}/v4/spreadsheets/{id}/{extra...}` with each segment escaped
    fn endpoint(&self, extra: &[&str]) -> Result<Url, SourceError> {
        let spreadsheet_id = self.settings.spreadsheet_id.trim();
        if spreadsheet_id.is_empty() {
            return Err(SourceError::Configuration(
                "Spreadsheet ID is not configured".to_string(),
            ));
        }

        let mut url = Url::parse(&self.settings.api_base_url).map_err(|e| {
            SourceError::Configuration(format!(
                "Invalid Sheets API base URL '{}': {}",
                self.settings.api_base_url, e
            ))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                SourceError::Configuration(format!(
                    "Sheets API base URL '{}' cannot carry a path",
                    self.settings.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id])
            .extend(extra);

        Ok(url)
    }

    async fn get_json(
        &self,
        url: Url,
        query: &[(&str, &str)],
        range: Option<&str>,
    ) -> Result<String, SourceError> {
        let token = self.bearer_token().await?;

        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);
        Err(SourceError::from_api_response(range, status.as_u16(), message))
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableSource for GoogleSheetsSource {
    async fn fetch_values(&self, range: &str) -> Result<Rows, SourceError> {
        let url = self.endpoint(&["values", range])?;
        let body = self
            .get_json(url, &[("majorDimension", "ROWS")], Some(range))
            .await?;

        let value_range: ValueRange = serde_json::from_str(&body)
            .map_err(|e| SourceError::InvalidResponse(format!("values for {}: {}", range, e)))?;

        Ok(value_range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn sheet_titles(&self) -> Result<Vec<String>, SourceError> {
        let url = self.endpoint(&[])?;
        let body = self
            .get_json(url, &[("fields", "sheets.properties.title")], None)
            .await?;

        let meta: SpreadsheetMeta = serde_json::from_str(&body)
            .map_err(|e| SourceError::InvalidResponse(format!("spreadsheet metadata: {}", e)))?;

        Ok(meta
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.title)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    fn source(id: &str, base: &str) -> GoogleSheetsSource {
        GoogleSheetsSource::new(SheetsSettings {
            spreadsheet_id: id.to_string(),
            api_base_url: base.to_string(),
            credentials: Credentials::AccessToken("t".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_escapes_range() {
        let url = source("abc", "https://sheets.example.com/")
            .endpoint(&["values", "'Shipping Rules'!A2:H"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/abc/values/'Shipping%20Rules'!A2:H"
        );
    }

    #[test]
    fn test_missing_spreadsheet_id() {
        let err = source("  ", DEFAULT_API_BASE_URL).endpoint(&[]).unwrap_err();
        assert!(matches!(err, SourceError::Configuration(_)));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(json!("VN")), "VN");
        assert_eq!(cell_text(json!(2.5)), "2.5");
        assert_eq!(cell_text(json!(true)), "true");
        assert_eq!(cell_text(Value::Null), "");
    }
}
