//! Sync orchestration
//!
//! Drains one resource at a time: build filters from the bookmark, walk
//! the pages, flatten and emit each record, then advance the bookmark.
//!
//! # Overview
//!
//! - `SyncOrchestrator` - drives the per-resource passes
//! - `SyncConfig` - run-level behavior (fail fast or continue)
//! - `Message` / `MessageSink` - output of a run (records, state, logs)

mod types;

pub use types::{
    LogLevel, Message, MessageSink, ResourceOutcome, SyncConfig, SyncSettings, SyncStats,
};

use crate::catalog::ResourceDescriptor;
use crate::error::{Error, Result};
use crate::http::HttpExecutor;
use crate::pagination::Paginator;
use crate::replication::{flatten_record, normalize_timestamp, ReplicationCursor};
use crate::state::StateManager;
use crate::types::{greater_than_filter, QueryParams, ACCOUNT_FILTER_PARAM};
use std::time::Instant;
use tracing::{error, info, warn};

/// Orchestrates data extraction across resources
pub struct SyncOrchestrator {
    /// Request executor
    executor: HttpExecutor,
    /// State manager
    state: StateManager,
    /// Where resources live
    settings: SyncSettings,
    /// Sync configuration
    config: SyncConfig,
    /// Statistics
    stats: SyncStats,
}

impl SyncOrchestrator {
    /// Create a new orchestrator
    pub fn new(executor: HttpExecutor, state: StateManager, settings: SyncSettings) -> Self {
        Self {
            executor,
            state,
            settings,
            config: SyncConfig::default(),
            stats: SyncStats::default(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the executor
    pub fn executor(&self) -> &HttpExecutor {
        &self.executor
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Server-side filters for one pass over `resource`, starting after `prior`
    /// (or after the configured start date when there is no bookmark)
    pub fn build_filters(
        &self,
        resource: &ResourceDescriptor,
        prior: Option<&str>,
    ) -> Result<QueryParams> {
        let mut filters = QueryParams::new();

        if resource.account_scoped {
            let account_id = self
                .settings
                .account_id
                .as_deref()
                .ok_or_else(|| Error::missing_field("account_id"))?;
            filters.insert(ACCOUNT_FILTER_PARAM.to_string(), account_id.to_string());
        }

        if let Some(ref key) = resource.replication_key {
            if let Some(lower) = prior.or(self.settings.start_date.as_deref()) {
                let lower = normalize_timestamp(lower).unwrap_or_else(|| {
                    warn!(stream = %resource.name, value = lower, "passing unparseable lower bound through");
                    lower.to_string()
                });
                filters.insert(greater_than_filter(key), lower);
            }
        }

        Ok(filters)
    }

    /// One full pass over `resource`. The bookmark only moves once every
    /// page has been fetched; any error leaves it where it was.
    pub async fn sync_resource(
        &mut self,
        resource: &ResourceDescriptor,
        sink: &mut dyn MessageSink,
    ) -> Result<ResourceOutcome> {
        let stream = resource.name.as_str();
        let prior = self.state.get_bookmark(stream).await;
        let filters = self.build_filters(resource, prior.as_deref())?;

        info!(stream, bookmark = ?prior, "starting sync");
        sink.emit(Message::info(format!("Starting sync for stream: {stream}")))?;

        let timeout = if resource.large_pages {
            self.settings.large_read_timeout
        } else {
            self.settings.read_timeout
        };
        let mut pages = Paginator::new(&self.executor, self.settings.page_size)
            .termination(resource.termination)
            .timeout(Some(timeout))
            .pages(&resource.url(&self.settings.base_url), &filters)?;

        let mut cursor = resource.replication_key.as_deref().map(ReplicationCursor::new);
        let mut records = 0u64;

        while let Some(page) = pages.next_page(&self.executor).await? {
            self.stats.add_page();
            for raw in page {
                let record =
                    flatten_record(raw, resource.replication_key.as_deref(), &resource.fields);
                if let Some(ref mut cursor) = cursor {
                    cursor.observe_object(&record);
                }
                sink.emit(Message::record(stream, record))?;
                records += 1;
            }
        }
        self.stats.add_records(records);

        let bookmark = match cursor {
            Some(ref cursor) => cursor.bookmark(prior.as_deref()),
            None => prior.clone(),
        };
        if let Some(ref value) = bookmark {
            if self.state.advance_bookmark(stream, value).await? {
                info!(stream, bookmark = %value, "advanced bookmark");
            }
        }

        let snapshot = self.state.snapshot().await.without_credentials();
        sink.emit(Message::state(serde_json::to_value(snapshot)?))?;

        let outcome = ResourceOutcome {
            stream: stream.to_string(),
            records,
            pages: pages.state().pages,
            bookmark,
        };
        self.stats.add_stream();

        info!(stream, records, pages = outcome.pages, "completed sync");
        sink.emit(Message::info(format!(
            "Completed sync for {stream}: {records} records in {} pages",
            outcome.pages
        )))?;

        Ok(outcome)
    }

    /// Sync every resource in order. With `fail_fast` the first failure ends
    /// the run; otherwise it is logged, the next resource proceeds, and the
    /// first failure is returned once all resources were attempted.
    pub async fn sync_all(
        &mut self,
        resources: &[ResourceDescriptor],
        sink: &mut dyn MessageSink,
    ) -> Result<SyncStats> {
        let start = Instant::now();
        let mut first_error = None;

        for resource in resources {
            if let Err(e) = self.sync_resource(resource, sink).await {
                self.stats.add_error();
                error!(stream = %resource.name, "sync failed: {e}");
                sink.emit(Message::error(format!(
                    "Error in stream {}: {e}",
                    resource.name
                )))?;

                if self.config.fail_fast {
                    self.stats.set_duration(start.elapsed().as_millis() as u64);
                    return Err(e);
                }
                first_error.get_or_insert(e);
            }
        }

        self.stats.set_duration(start.elapsed().as_millis() as u64);

        match first_error {
            Some(e) => Err(e),
            None => Ok(self.stats.clone()),
        }
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = SyncStats::default();
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("settings", &self.settings)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
