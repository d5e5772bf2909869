//! HTTP executor
//!
//! Issues requests against the Optiply API and turns every response into
//! either a parsed JSON body or a classified [`Error`]:
//!
//! - 2xx with a JSON body → success; 204 or an empty body → success without a body
//! - 401 → one forced token refresh and replay, then [`Error::AuthExpired`]
//! - 429 → [`Error::RateLimited`] unless a bounded 429 budget is configured
//! - 408/502/503 and network timeouts → general retry budget
//! - 504 → its own, smaller retry budget
//! - 403/404/other 4xx → [`Error::ClientError`]; 500 and the rest → [`Error::Fatal`]
//! - 2xx with a body that is not JSON → [`Error::Protocol`]

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::retry::{classify_status, Budget, RetryPolicy, RetryState, StatusClass};
use crate::auth::AuthSession;
use crate::error::{Error, Result};
use crate::types::{QueryParams, JSON_API_MEDIA_TYPE};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Configuration for the executor
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Time allowed to establish a connection
    pub connect_timeout: Duration,
    /// Default time allowed for a whole request, body included
    pub read_timeout: Duration,
    /// Retry budgets and backoff
    pub retry: RetryPolicy,
    /// Optional client-side throttle
    pub rate_limit: Option<RateLimiterConfig>,
    /// Headers sent with every request
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let mut default_headers = HashMap::new();
        default_headers.insert("Content-Type".to_string(), JSON_API_MEDIA_TYPE.to_string());
        default_headers.insert("Accept".to_string(), JSON_API_MEDIA_TYPE.to_string());

        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            rate_limit: None,
            default_headers,
            user_agent: format!("optiply-tap/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for executor config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the default read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Enable the client-side throttle
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: QueryParams,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Override the read timeout for this request
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Replace all query parameters
    #[must_use]
    pub fn query_params(mut self, params: QueryParams) -> Self {
        self.query = params;
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A successful response
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    /// HTTP status
    pub status: u16,
    /// Parsed body; `None` for 204 or an empty body
    pub body: Option<Value>,
    /// Retries spent before this response arrived
    pub retries: u32,
}

impl ParsedResponse {
    /// Whether the server sent no content
    pub fn is_empty(&self) -> bool {
        self.body.is_none()
    }
}

/// Executes requests with auth, classification, and bounded retries
pub struct HttpExecutor {
    client: Client,
    config: HttpClientConfig,
    session: Option<Arc<AuthSession>>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpExecutor {
    /// Create an executor with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create an executor with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(Error::Http)?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            session: None,
            rate_limiter,
        })
    }

    /// Create an executor that authenticates through `session`
    pub fn with_session(config: HttpClientConfig, session: Arc<AuthSession>) -> Result<Self> {
        let mut executor = Self::with_config(config)?;
        executor.session = Some(session);
        Ok(executor)
    }

    /// The auth session, if any
    pub fn session(&self) -> Option<&Arc<AuthSession>> {
        self.session.as_ref()
    }

    /// The executor configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, config: RequestConfig) -> Result<ParsedResponse> {
        self.execute(Method::GET, url, config).await
    }

    /// Perform one logical request, retrying within the configured budgets
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<ParsedResponse> {
        let timeout = config.timeout.unwrap_or(self.config.read_timeout);
        let policy = &self.config.retry;
        let mut retry_state = RetryState::new();
        let mut replayed_after_401 = false;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self.client.request(method.clone(), url).timeout(timeout);
            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }
            for (key, value) in &config.headers {
                req = req.header(key.as_str(), value.as_str());
            }
            if !config.query.is_empty() {
                req = req.query(&config.query);
            }

            let bearer = match self.session {
                Some(ref session) => {
                    let token = session.access_token().await?;
                    req = req.bearer_auth(&token);
                    Some(token)
                }
                None => None,
            };

            let sent = match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    response.text().await.map(|text| (status, headers, text))
                }
                Err(e) => Err(e),
            };

            let (status, headers, text) = match sent {
                Ok(parts) => parts,
                Err(e) => {
                    let err = Error::Http(e);
                    if !err.is_retryable() {
                        error!(url, "request failed: {err}");
                        return Err(err);
                    }
                    let Some(delay) = retry_state.charge(Budget::General, policy) else {
                        let attempts = retry_state.attempts(Budget::General);
                        error!(url, attempts, "request failed, retries exhausted: {err}");
                        return Err(match err {
                            Error::Http(e) if e.is_timeout() => Error::Timeout {
                                timeout_ms: timeout.as_millis() as u64,
                                attempts,
                            },
                            other => other,
                        });
                    };
                    warn!(
                        url,
                        attempt = retry_state.attempts(Budget::General),
                        max_retries = policy.max_retries,
                        ?delay,
                        "request failed ({err}), retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            match classify_status(status) {
                StatusClass::Success => {
                    let retries = retry_state.retries(policy);
                    debug!(%method, url, status = status.as_u16(), retries, "request succeeded");
                    return Ok(ParsedResponse {
                        status: status.as_u16(),
                        body: parse_body(status, &text, url)?,
                        retries,
                    });
                }

                StatusClass::AuthExpired => {
                    if let (Some(session), Some(token), false) =
                        (&self.session, bearer.as_deref(), replayed_after_401)
                    {
                        warn!(url, "access token rejected (401), refreshing and replaying once");
                        replayed_after_401 = true;
                        session.invalidate(token).await;
                        continue;
                    }
                    error!(url, "authentication failed (401)");
                    return Err(Error::AuthExpired {
                        url: url.to_string(),
                    });
                }

                StatusClass::RateLimited => {
                    let retry_after = extract_retry_after(&headers);
                    if retry_state.charge(Budget::RateLimit, policy).is_some() {
                        let delay = policy.rate_limit_delay(retry_after);
                        warn!(
                            url,
                            attempt = retry_state.attempts(Budget::RateLimit),
                            ?delay,
                            "rate limited (429), waiting"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    error!(url, "rate limit exceeded (429)");
                    return Err(Error::RateLimited {
                        retry_after_seconds: retry_after,
                    });
                }

                class @ (StatusClass::GatewayTimeout | StatusClass::Transient) => {
                    let budget = if class == StatusClass::GatewayTimeout {
                        Budget::GatewayTimeout
                    } else {
                        Budget::General
                    };
                    match retry_state.charge(budget, policy) {
                        Some(delay) => {
                            warn!(
                                url,
                                status = status.as_u16(),
                                attempt = retry_state.attempts(budget),
                                ?delay,
                                "transient server error, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            let attempts = retry_state.attempts(budget);
                            error!(url, status = status.as_u16(), attempts, "all retries failed");
                            return Err(Error::TransientServer {
                                status: status.as_u16(),
                                attempts,
                            });
                        }
                    }
                }

                StatusClass::ClientError => {
                    error!(url, status = status.as_u16(), "client error");
                    return Err(Error::ClientError {
                        status: status.as_u16(),
                        body: truncate(&text),
                    });
                }

                StatusClass::Fatal => {
                    error!(url, status = status.as_u16(), "server error: {}", truncate(&text));
                    return Err(Error::Fatal {
                        status: status.as_u16(),
                        body: truncate(&text),
                    });
                }
            }
        }
    }

    /// Check if client-side throttling is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }
}

impl std::fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("config", &self.config)
            .field("has_session", &self.session.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Parse a successful body; empty means "no content"
fn parse_body(status: StatusCode, text: &str, url: &str) -> Result<Option<Value>> {
    if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
        debug!(url, "received empty response");
        return Ok(None);
    }
    serde_json::from_str(text).map(Some).map_err(|e| {
        error!(url, "invalid JSON response: {e}; content: {}", truncate(text));
        Error::protocol(format!("invalid JSON from {url}: {e}"))
    })
}

/// Extract retry-after header value in seconds
fn extract_retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(60)
}

/// First 200 characters of a body, for error messages
fn truncate(text: &str) -> String {
    let mut out: String = text.chars().take(200).collect();
    if text.chars().count() > 200 {
        out.push_str("...");
    }
    out
}
