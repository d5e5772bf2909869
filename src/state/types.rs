//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use crate::auth::PersistedToken;
use crate::replication::parse_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete state for the tap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Per-stream bookmarks
    #[serde(default, alias = "bookmarks")]
    pub streams: BTreeMap<String, StreamState>,

    /// Cached access token for reuse by the next run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<PersistedToken>,
}

impl SyncState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.streams.entry(stream.to_string()).or_default()
    }

    /// Bookmark for a stream
    pub fn bookmark(&self, stream: &str) -> Option<&str> {
        self.streams.get(stream)?.replication_value.as_deref()
    }

    /// Move a stream's bookmark forward to `value`. A value that is not
    /// later than the current bookmark leaves it alone. Returns whether the
    /// bookmark changed.
    pub fn advance_bookmark(&mut self, stream: &str, value: &str) -> bool {
        let Some(candidate) = parse_timestamp(value) else {
            return false;
        };
        let current = self.bookmark(stream).and_then(parse_timestamp);
        if current.is_some_and(|current| current >= candidate) {
            return false;
        }
        self.get_stream_mut(stream).replication_value = Some(value.to_string());
        true
    }

    /// Copy of this state with the cached token removed, safe to emit
    pub fn without_credentials(&self) -> Self {
        Self {
            streams: self.streams.clone(),
            credentials: None,
        }
    }
}

/// State for a single stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamState {
    /// Last replication value (ISO-8601, UTC)
    #[serde(default, alias = "replication_key_value")]
    pub replication_value: Option<String>,
}

impl StreamState {
    /// Stream state with a bookmark
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            replication_value: Some(value.into()),
        }
    }
}
