//! Token persistence
//!
//! A refreshed token is written back so the next run can reuse it instead of
//! hitting the token endpoint again.

use super::types::PersistedToken;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Destination for freshly minted tokens
#[async_trait]
pub trait TokenSink: Send + Sync {
    /// Store `token` for reuse by later runs
    async fn persist_token(&self, token: &PersistedToken) -> Result<()>;
}

/// Writes `access_token` and `token_expires_at` back into the JSON config file,
/// leaving every other key untouched. A config nested under a top-level
/// `config` key gets the token inside that object.
#[derive(Debug, Clone)]
pub struct ConfigFileTokenSink {
    path: PathBuf,
}

impl ConfigFileTokenSink {
    /// Create a sink for the config file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The config file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenSink for ConfigFileTokenSink {
    async fn persist_token(&self, token: &PersistedToken) -> Result<()> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let mut config: Value = serde_json::from_str(&contents)?;

        let root = config
            .as_object_mut()
            .ok_or_else(|| Error::config("config file is not a JSON object"))?;
        // Configs nested under `config` are read from there on the next run
        let nested = !root.contains_key("client_id")
            && root.get("config").is_some_and(Value::is_object);
        let object = if nested {
            root.get_mut("config")
                .and_then(Value::as_object_mut)
                .ok_or_else(|| Error::config("config file is not a JSON object"))?
        } else {
            root
        };
        object.insert(
            "access_token".to_string(),
            Value::String(token.access_token.clone()),
        );
        object.insert(
            "token_expires_at".to_string(),
            Value::from(token.token_expires_at),
        );

        let rendered = serde_json::to_string_pretty(&config)?;
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, rendered).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        tracing::info!(path = %self.path.display(), "saved access token to config file");
        Ok(())
    }
}
