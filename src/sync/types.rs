//! Sync types
//!
//! Message types and configuration for the orchestrator.

use crate::error::Result;
use crate::types::{JsonObject, JsonValue, DEFAULT_BASE_URL};
use std::time::Duration;

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// One flattened record
    Record {
        /// Stream name
        stream: String,
        /// The record
        record: JsonObject,
    },
    /// Full state snapshot, without credentials
    State {
        /// State data
        value: JsonValue,
    },
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

/// Log level for sync messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// General information
    Info,
    /// Warning
    Warn,
    /// Error (non-fatal)
    Error,
}

impl Message {
    /// Create a record message
    pub fn record(stream: impl Into<String>, record: JsonObject) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
        }
    }

    /// Create a state message
    pub fn state(value: JsonValue) -> Self {
        Self::State { value }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create an error log
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

/// Receiver of sync output
pub trait MessageSink {
    /// Accept one message
    fn emit(&mut self, message: Message) -> Result<()>;
}

impl MessageSink for Vec<Message> {
    fn emit(&mut self, message: Message) -> Result<()> {
        self.push(message);
        Ok(())
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Whether the first failing resource aborts the run
    pub fail_fast: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { fail_fast: true }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fail fast mode
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Where and how resources are fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// API root
    pub base_url: String,
    /// Value of `filter[accountId]`
    pub account_id: Option<String>,
    /// Lower bound for streams without a bookmark
    pub start_date: Option<String>,
    /// Records per page
    pub page_size: u32,
    /// Read timeout for ordinary resources
    pub read_timeout: Duration,
    /// Read timeout for large-page resources
    pub large_read_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            account_id: None,
            start_date: None,
            page_size: 25,
            read_timeout: Duration::from_secs(30),
            large_read_timeout: Duration::from_secs(120),
        }
    }
}

/// Result of one completed resource pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOutcome {
    /// Stream name
    pub stream: String,
    /// Records emitted
    pub records: u64,
    /// Pages fetched
    pub pages: u64,
    /// Bookmark after the pass
    pub bookmark: Option<String>,
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Total records synced
    pub records_synced: u64,
    /// Total pages fetched
    pub pages_fetched: u64,
    /// Resources that completed
    pub streams_synced: u64,
    /// Resources that failed
    pub errors: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records
    pub fn add_records(&mut self, count: u64) {
        self.records_synced += count;
    }

    /// Add a page
    pub fn add_page(&mut self) {
        self.pages_fetched += 1;
    }

    /// Add a stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add an error
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
