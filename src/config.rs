//! Tap configuration
//!
//! The JSON config file (or inline JSON) the binary is started with.
//! Credentials are required; everything else has a default.

use crate::auth::{Credentials, PersistedToken, Token};
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig, RetryPolicy};
use crate::replication::parse_timestamp;
use crate::sync::SyncSettings;
use crate::types::{JsonValue, DEFAULT_BASE_URL, DEFAULT_TOKEN_URL};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete tap configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// OAuth client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,

    /// Optiply user name
    #[serde(default)]
    pub username: String,

    /// Optiply password
    #[serde(default)]
    pub password: String,

    /// Account the account-scoped resources are filtered by
    #[serde(default, deserialize_with = "string_or_number")]
    pub account_id: Option<String>,

    /// Lower bound for streams without a bookmark
    #[serde(default)]
    pub start_date: Option<String>,

    /// Token cached by a previous run
    #[serde(default)]
    pub access_token: Option<String>,

    /// Expiry of the cached token, unix seconds
    #[serde(default)]
    pub token_expires_at: Option<i64>,

    /// API root
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Records per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// HTTP tuning
    #[serde(default)]
    pub http: HttpSettings,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_page_size() -> u32 {
    25
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) if s.trim().is_empty() => None,
        Some(JsonValue::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl TapConfig {
    /// Parse a config from a JSON value. A config nested under a top-level
    /// `config` key is unwrapped.
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let value = match value {
            JsonValue::Object(mut map)
                if !map.contains_key("client_id")
                    && map.get("config").is_some_and(JsonValue::is_object) =>
            {
                map.remove("config").unwrap_or_default()
            }
            other => other,
        };
        serde_json::from_value(value).map_err(|e| Error::config(format!("invalid config: {e}")))
    }

    /// Parse a config from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("config is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Read a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Check required fields and value formats
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
        }

        if let Some(ref start_date) = self.start_date {
            if parse_timestamp(start_date).is_none() {
                return Err(Error::invalid_value(
                    "start_date",
                    format!("'{start_date}' is not an ISO-8601 timestamp"),
                ));
            }
        }

        if self.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be greater than zero"));
        }

        for (field, value) in [("base_url", &self.base_url), ("token_url", &self.token_url)] {
            url::Url::parse(value)
                .map_err(|e| Error::invalid_value(field, format!("'{value}': {e}")))?;
        }

        Ok(())
    }

    /// OAuth credentials
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.client_id.clone(),
            self.client_secret.clone(),
            self.username.clone(),
            self.password.clone(),
        )
    }

    /// Token cached in the config by a previous run
    pub fn cached_token(&self) -> Option<Token> {
        let access_token = self.access_token.clone().filter(|t| !t.is_empty())?;
        PersistedToken {
            access_token,
            token_expires_at: self.token_expires_at?,
        }
        .to_token()
    }

    /// Safety margin before token expiry
    pub fn token_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.http.token_margin_secs)
    }

    /// Retry policy for the executor
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.http.max_retries,
            max_gateway_timeout_retries: self.http.max_gateway_timeout_retries,
            rate_limit_retries: self.http.rate_limit_retries,
            initial_backoff: Duration::from_millis(self.http.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.http.max_backoff_ms),
        }
    }

    /// Executor configuration
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .connect_timeout(Duration::from_secs(self.http.connect_timeout_secs))
            .read_timeout(Duration::from_secs(self.http.read_timeout_secs))
            .retry(self.retry_policy());
        if let Some(rps) = self.http.requests_per_second.filter(|r| *r > 0) {
            builder = builder.rate_limit(RateLimiterConfig::per_second(rps));
        }
        builder.build()
    }

    /// Settings for the orchestrator
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            base_url: self.base_url.clone(),
            account_id: self.account_id.clone(),
            start_date: self.start_date.clone(),
            page_size: self.page_size,
            read_timeout: Duration::from_secs(self.http.read_timeout_secs),
            large_read_timeout: Duration::from_secs(self.http.large_read_timeout_secs),
        }
    }
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("account_id", &self.account_id)
            .field("start_date", &self.start_date)
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("page_size", &self.page_size)
            .field("http", &self.http)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// HTTP timeouts, retry budgets and throttling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds
    pub read_timeout_secs: u64,
    /// Read timeout for large-page resources in seconds
    pub large_read_timeout_secs: u64,
    /// Retries for 408/502/503 and network failures
    pub max_retries: u32,
    /// Retries for 504
    pub max_gateway_timeout_retries: u32,
    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Backoff cap in milliseconds
    pub max_backoff_ms: u64,
    /// Retries for 429; zero makes it fatal
    pub rate_limit_retries: u32,
    /// Client-side throttle
    pub requests_per_second: Option<u32>,
    /// Seconds before expiry at which a token is refreshed
    pub token_margin_secs: i64,
    /// Attempts at the token endpoint before giving up
    pub max_auth_attempts: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
            large_read_timeout_secs: 120,
            max_retries: 3,
            max_gateway_timeout_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            rate_limit_retries: 0,
            requests_per_second: None,
            token_margin_secs: 120,
            max_auth_attempts: 3,
        }
    }
}
