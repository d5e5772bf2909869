//! Auth session
//!
//! Hands out valid bearer headers, refreshing the token when it is missing
//! or inside the safety margin. The store sits behind one `RwLock`, so a
//! refresh is single-flight: whoever takes the write lock re-checks the token
//! before calling the endpoint, and everyone else waits for that result.

use super::sink::TokenSink;
use super::store::TokenStore;
use super::types::{PersistedToken, Token};
use crate::error::Result;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default number of seconds kept in reserve before a token's expiry
pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 120;

/// Shared, refreshing access to one bearer token
pub struct AuthSession {
    store: RwLock<TokenStore>,
    margin: Duration,
    sinks: Vec<Arc<dyn TokenSink>>,
    refreshes: AtomicU32,
}

impl AuthSession {
    /// Wrap a token store
    pub fn new(store: TokenStore) -> Self {
        Self {
            store: RwLock::new(store),
            margin: Duration::seconds(DEFAULT_SAFETY_MARGIN_SECS),
            sinks: Vec::new(),
            refreshes: AtomicU32::new(0),
        }
    }

    /// Set the safety margin
    #[must_use]
    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Persist every freshly minted token through `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TokenSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Reuse a token from a previous run if it is still valid.
    /// Returns whether the token was accepted.
    pub async fn seed(&self, token: Token) -> bool {
        if !token.is_valid(self.margin) {
            debug!(expires_at = %token.expires_at, "ignoring cached token near or past expiry");
            return false;
        }
        info!(expires_at = %token.expires_at, "reusing cached access token");
        self.store.write().await.replace(token);
        true
    }

    /// `Authorization` header for the current token, refreshing first if needed
    pub async fn get_valid_headers(&self) -> Result<HashMap<String, String>> {
        let token = self.access_token().await?;
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        Ok(headers)
    }

    /// A currently valid access token, refreshing first if needed
    pub async fn access_token(&self) -> Result<String> {
        {
            let store = self.store.read().await;
            if let Some(token) = store.valid_token(self.margin) {
                return Ok(token.access_token.clone());
            }
        }

        let mut store = self.store.write().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = store.valid_token(self.margin) {
            return Ok(token.access_token.clone());
        }

        let token = store.refresh().await?.clone();
        drop(store);

        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.persist(&token).await;
        Ok(token.access_token)
    }

    /// Forget `rejected` after the API answered 401 for it, so the next
    /// [`access_token`](Self::access_token) call mints a new one. A token that
    /// was already replaced by a concurrent refresh is left alone.
    pub async fn invalidate(&self, rejected: &str) {
        let discarded = self.store.write().await.discard_if(rejected);
        if discarded {
            debug!("discarded rejected access token");
        }
    }

    /// Number of refreshes performed by this session
    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Snapshot of the held token
    pub async fn current_token(&self) -> Option<Token> {
        self.store.read().await.current().cloned()
    }

    /// The safety margin in use
    pub fn margin(&self) -> Duration {
        self.margin
    }

    async fn persist(&self, token: &Token) {
        let persisted = PersistedToken::from(token);
        for sink in &self.sinks {
            // The in-memory token is usable either way
            if let Err(e) = sink.persist_token(&persisted).await {
                warn!("failed to persist refreshed token: {e}");
            }
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("margin", &self.margin)
            .field("sinks", &self.sinks.len())
            .field("refreshes", &self.refresh_count())
            .finish_non_exhaustive()
    }
}
