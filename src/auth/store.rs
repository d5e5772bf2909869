//! Token store
//!
//! Owns the credentials and the one current token, and knows how to mint a
//! replacement from the OAuth2 token endpoint. It does no locking of its
//! own; [`AuthSession`](super::AuthSession) wraps it for shared use.

use super::types::{Credentials, Token, TokenResponse, PASSWORD_GRANT};
use crate::error::{Error, Result};
use crate::http::{classify_status, Budget, RetryPolicy, RetryState, StatusClass};
use chrono::{Duration, Utc};
use reqwest::Client;
use tracing::{debug, info, warn};

/// Holds the current bearer token and the credentials to replace it
pub struct TokenStore {
    credentials: Credentials,
    token_url: String,
    current: Option<Token>,
    http_client: Client,
    retry: RetryPolicy,
    max_attempts: u32,
}

impl TokenStore {
    /// Create a store with a default HTTP client
    pub fn new(credentials: Credentials, token_url: impl Into<String>) -> Self {
        Self::with_client(credentials, token_url, Client::new())
    }

    /// Create a store with a custom HTTP client
    pub fn with_client(
        credentials: Credentials,
        token_url: impl Into<String>,
        http_client: Client,
    ) -> Self {
        Self {
            credentials,
            token_url: token_url.into(),
            current: None,
            http_client,
            retry: RetryPolicy::default(),
            max_attempts: 3,
        }
    }

    /// Set the backoff used between failed token requests
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the total number of token requests one refresh may make
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// The token currently held, valid or not
    pub fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    /// The held token, if it is usable with `margin` to spare
    pub fn valid_token(&self, margin: Duration) -> Option<&Token> {
        self.current.as_ref().filter(|t| t.is_valid(margin))
    }

    /// Replace the held token
    pub fn replace(&mut self, token: Token) {
        self.current = Some(token);
    }

    /// Drop the held token if it is still the one that was rejected.
    /// Returns whether anything was cleared.
    pub fn discard_if(&mut self, rejected: &str) -> bool {
        if self
            .current
            .as_ref()
            .is_some_and(|t| t.access_token == rejected)
        {
            self.current = None;
            return true;
        }
        false
    }

    /// Token endpoint URL
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Mint a new token and hold it
    pub async fn refresh(&mut self) -> Result<&Token> {
        let token = self.fetch_token().await?;
        info!(expires_at = %token.expires_at, "OAuth authorization succeeded");
        debug!(token = %token.redacted(), "new access token");
        Ok(self.current.insert(token))
    }

    /// Call the token endpoint, retrying transient failures a bounded number of times
    async fn fetch_token(&self) -> Result<Token> {
        let form = [
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
        ];
        let mut retries = RetryState::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let sent = self
                .http_client
                .post(&self.token_url)
                .query(&[("grant_type", PASSWORD_GRANT)])
                .basic_auth(
                    &self.credentials.client_id,
                    Some(&self.credentials.client_secret),
                )
                .form(&form)
                .send()
                .await;

            let failure = match sent {
                Ok(response) => {
                    let status = response.status();
                    let class = classify_status(status);
                    if class == StatusClass::Success {
                        let body = response.text().await.map_err(|e| {
                            Error::auth(format!("failed to read token response: {e}"))
                        })?;
                        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
                            Error::auth(format!("token endpoint returned invalid JSON: {e}"))
                        })?;
                        return parsed.into_token(Utc::now());
                    }

                    let body = response.text().await.unwrap_or_default();
                    if !class.is_transient() {
                        return Err(Error::auth(format!(
                            "token request failed with status {}: {body}",
                            status.as_u16()
                        )));
                    }
                    format!("status {}", status.as_u16())
                }
                Err(e) if e.is_timeout() || e.is_connect() => e.to_string(),
                Err(e) => return Err(Error::auth(format!("token request failed: {e}"))),
            };

            if attempt >= self.max_attempts {
                return Err(Error::auth(format!(
                    "token request failed after {attempt} attempts: {failure}"
                )));
            }
            let delay = retries
                .charge(Budget::General, &self.retry)
                .unwrap_or(self.retry.initial_backoff);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                ?delay,
                "token request failed ({failure}), retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("credentials", &self.credentials)
            .field("token_url", &self.token_url)
            .field("current", &self.current)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
