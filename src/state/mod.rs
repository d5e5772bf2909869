//! State management module
//!
//! Per-stream bookmarks and the cached access token, persisted between
//! runs so the next sync starts where this one finished.
//!
//! - `SyncState` - serialized state: bookmarks plus optional credentials
//! - `StateManager` - file-backed persistence with atomic writes

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{StreamState, SyncState};
