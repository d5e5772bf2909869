// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Optiply Tap
//!
//! Incremental extractor for the Optiply JSON:API. Pulls every record
//! changed since the last run and writes it as a line of JSON, followed by
//! a state snapshot the next run resumes from.
//!
//! ## Features
//!
//! - **OAuth2 password grant**: single-flight token refresh, cached tokens
//!   reused across runs, one replay after a `401`
//! - **Classified retries**: separate budgets for gateway timeouts and other
//!   transient failures, rate limits fatal by default
//! - **Link-following pagination**: walks `links.next` until exhausted
//! - **Incremental sync**: `updatedAt` bookmarks that never move backwards
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use optiply_tap::auth::{AuthSession, Credentials, TokenStore};
//! use optiply_tap::catalog::builtin_resources;
//! use optiply_tap::http::{HttpClientConfig, HttpExecutor};
//! use optiply_tap::state::StateManager;
//! use optiply_tap::sync::{SyncOrchestrator, SyncSettings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> optiply_tap::Result<()> {
//!     let store = TokenStore::new(
//!         Credentials::new("client", "secret", "user", "pass"),
//!         optiply_tap::DEFAULT_TOKEN_URL,
//!     );
//!     let session = Arc::new(AuthSession::new(store));
//!     let executor = HttpExecutor::with_session(HttpClientConfig::default(), session)?;
//!
//!     let state = StateManager::new("state.json");
//!     let mut orchestrator = SyncOrchestrator::new(executor, state, SyncSettings::default());
//!
//!     let mut messages = Vec::new();
//!     orchestrator.sync_all(&builtin_resources(), &mut messages).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          CLI Runner                          │
//! │        sync --streams ...     check        streams           │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┴────────────────────────────────┐
//! │                       SyncOrchestrator                       │
//! │  filters → pages → flatten → cursor → RECORD ... → STATE     │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────┬──────────────┬───┴─────────┬───────────┬──────────┐
//! │   Auth   │     HTTP     │  Paginate   │ Replicate │  Output  │
//! ├──────────┼──────────────┼─────────────┼───────────┼──────────┤
//! │ Password │ Classify     │ links.next  │ Cursor    │ JSON     │
//! │ grant    │ Retry budget │ Short page  │ Flatten   │ lines    │
//! │ Sinks    │ Rate limit   │             │           │          │
//! └──────────┴──────────────┴─────────────┴───────────┴──────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the tap
pub mod error;

/// Common types and constants
pub mod types;

/// OAuth2 password grant and token lifecycle
pub mod auth;

/// HTTP executor with failure classification, retry and rate limiting
pub mod http;

/// JSON:API pagination
pub mod pagination;

/// Replication cursor and record flattening
pub mod replication;

/// Bookmark and credential state
pub mod state;

/// JSON lines output
pub mod output;

/// Resource catalog
pub mod catalog;

/// Tap configuration
pub mod config;

/// Per-resource sync orchestration
pub mod sync;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
