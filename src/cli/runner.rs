//! CLI runner - executes commands

use crate::auth::{AuthSession, ConfigFileTokenSink, Token, TokenStore};
use crate::catalog::{builtin_resources, select_resources};
use crate::cli::commands::{Cli, Commands};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::http::HttpExecutor;
use crate::output::JsonLinesWriter;
use crate::state::StateManager;
use crate::sync::{MessageSink, SyncConfig, SyncOrchestrator, SyncStats};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Sync {
                streams,
                continue_on_error,
            } => {
                let mut writer = JsonLinesWriter::stdout();
                self.sync(streams.as_deref(), *continue_on_error, &mut writer)
                    .await
                    .map(|_| ())
            }
            Commands::Check => self.check().await,
            Commands::Streams => {
                self.streams();
                Ok(())
            }
        }
    }

    /// Load and validate configuration
    fn load_config(&self) -> Result<TapConfig> {
        // Inline config takes precedence
        let config = if let Some(json_str) = &self.cli.config_json {
            TapConfig::from_json(json_str)?
        } else if let Some(path) = &self.cli.config {
            TapConfig::from_file(path)?
        } else {
            return Err(Error::config("either --config or --config-json is required"));
        };
        config.validate()?;
        Ok(config)
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Auth session that persists refreshed tokens to the state and, when
    /// running from a config file, back into that file
    async fn build_session(
        &self,
        config: &TapConfig,
        state: &StateManager,
    ) -> Result<Arc<AuthSession>> {
        let store = TokenStore::new(config.credentials(), config.token_url.clone())
            .with_retry(config.retry_policy())
            .with_max_attempts(config.http.max_auth_attempts);

        let mut session = AuthSession::new(store)
            .with_margin(config.token_margin())
            .with_sink(Arc::new(state.clone()));
        if let Some(path) = &self.cli.config {
            session = session.with_sink(Arc::new(ConfigFileTokenSink::new(path)));
        }

        let from_state = state
            .credentials()
            .await
            .and_then(|persisted| persisted.to_token());
        if let Some(token) = latest_token(config.cached_token(), from_state) {
            session.seed(token).await;
        }

        Ok(Arc::new(session))
    }

    /// Verify the credentials by obtaining a token
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let state = self.load_state()?;
        let session = self.build_session(&config, &state).await?;

        match session.access_token().await {
            Ok(_) => {
                output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "SUCCEEDED",
                        "message": "Credentials accepted"
                    }
                }));
                Ok(())
            }
            Err(e) => {
                output_message(&json!({
                    "type": "CONNECTION_STATUS",
                    "connectionStatus": {
                        "status": "FAILED",
                        "message": format!("Authentication failed: {e}")
                    }
                }));
                Err(e)
            }
        }
    }

    /// List stream names
    fn streams(&self) {
        for resource in builtin_resources() {
            output_message(&json!({
                "name": resource.name,
                "primary_key": resource.primary_key,
                "replication_key": resource.replication_key,
            }));
        }
    }

    /// Sync the selected streams into `sink`
    pub async fn sync(
        &self,
        streams: Option<&str>,
        continue_on_error: bool,
        sink: &mut dyn MessageSink,
    ) -> Result<SyncStats> {
        let config = self.load_config()?;
        let resources = select_resources(streams)?;
        let state = self.load_state()?;
        let session = self.build_session(&config, &state).await?;

        let executor = HttpExecutor::with_session(config.http_client_config(), session)?;
        let mut orchestrator = SyncOrchestrator::new(executor, state, config.sync_settings())
            .with_config(SyncConfig::new().with_fail_fast(!continue_on_error));

        let stats = orchestrator.sync_all(&resources, sink).await?;
        info!(
            streams = stats.streams_synced,
            records = stats.records_synced,
            pages = stats.pages_fetched,
            duration_ms = stats.duration_ms,
            "sync finished"
        );
        Ok(stats)
    }
}

/// The later-expiring of two cached tokens
fn latest_token(a: Option<Token>, b: Option<Token>) -> Option<Token> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.expires_at > a.expires_at { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// Output a message
fn output_message(msg: &Value) {
    println!("{}", serde_json::to_string(msg).unwrap_or_default());
}
