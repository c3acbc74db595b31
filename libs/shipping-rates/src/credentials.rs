//! Google service-account credentials and access-token minting
//!
//! Tokens are obtained with the OAuth2 JWT-bearer grant: a RS256 assertion
//! signed with the service-account key is exchanged at the key's `token_uri`.
//! Minted tokens are reused until shortly before they expire.

use crate::error::SourceError;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Read-only scope is all the engine ever needs
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime accepted by Google (max one hour)
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the reported expiry
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Where service credentials come from
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    /// Service-account key JSON given inline
    Inline(String),
    /// Path to a service-account keyfile
    KeyFile(PathBuf),
    /// Pre-issued bearer token, used as-is
    AccessToken(String),
    #[default]
    Missing,
}

impl Credentials {
    /// Pick credentials by precedence: inline JSON, then keyfile path
    pub fn from_options(inline_json: Option<&str>, key_file: Option<&Path>) -> Self {
        match (inline_json, key_file) {
            (Some(json), _) if !json.trim().is_empty() => Self::Inline(json.to_string()),
            (_, Some(path)) if !path.as_os_str().is_empty() => Self::KeyFile(path.to_path_buf()),
            _ => Self::Missing,
        }
    }
}

/// Fields of a Google service-account key file used for token minting
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        serde_json::from_str(json).map_err(|e| {
            SourceError::Configuration(format!("Invalid service account credentials JSON: {}", e))
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            SourceError::Configuration(format!(
                "Cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

enum TokenKind {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        encoding_key: EncodingKey,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Supplies bearer tokens for Sheets API calls
pub struct TokenProvider {
    kind: TokenKind,
}

impl TokenProvider {
    /// Resolve credentials into a provider, failing on missing or bad config
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, SourceError> {
        let key = match credentials {
            Credentials::AccessToken(token) => {
                return Ok(Self {
                    kind: TokenKind::Static(token.clone()),
                })
            },
            Credentials::Inline(json) => ServiceAccountKey::from_json(json)?,
            Credentials::KeyFile(path) => ServiceAccountKey::from_file(path)?,
            Credentials::Missing => {
                return Err(SourceError::Configuration(
                    "No service account credentials configured".to_string(),
                ))
            },
        };
        Self::service_account(key)
    }

    fn service_account(key: ServiceAccountKey) -> Result<Self, SourceError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            SourceError::Configuration(format!("Invalid service account private key: {}", e))
        })?;
        info!("Using service account {} for Sheets access", key.client_email);
        Ok(Self {
            kind: TokenKind::ServiceAccount {
                key,
                encoding_key,
                cached: Mutex::new(None),
            },
        })
    }

    /// Current bearer token, minting a new one when needed
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String, SourceError> {
        let (key, encoding_key, cached) = match &self.kind {
            TokenKind::Static(token) => return Ok(token.clone()),
            TokenKind::ServiceAccount {
                key,
                encoding_key,
                cached,
            } => (key, encoding_key, cached),
        };

        // Held across the exchange so concurrent callers share one mint
        let mut cached = cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let minted = mint_token(client, key, encoding_key).await?;
        let value = minted.value.clone();
        *cached = Some(minted);
        Ok(value)
    }
}

async fn mint_token(
    client: &reqwest::Client,
    key: &ServiceAccountKey,
    encoding_key: &EncodingKey,
) -> Result<CachedToken, SourceError> {
    let now = chrono::Utc::now().timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SHEETS_READONLY_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let assertion = jsonwebtoken::encode(&header, &claims, encoding_key)
        .map_err(|e| SourceError::Auth(format!("Failed to sign token assertion: {}", e)))?;

    debug!("Requesting Sheets access token from {}", key.token_uri);
    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => body,
        };
        return Err(SourceError::Auth(format!(
            "Token endpoint returned {}: {}",
            status.as_u16(),
            reason
        )));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| SourceError::Auth(format!("Malformed token response: {}", e)))?;

    let lifetime = Duration::from_secs(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS as u64));
    let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN);

    Ok(CachedToken {
        value: token.access_token,
        refresh_at,
    })
}
