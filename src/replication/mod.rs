//! Incremental replication
//!
//! [`ReplicationCursor`] tracks the high-water mark of a resource's
//! replication key during one pass; [`flatten_record`] turns a JSON:API
//! resource object into the flat record emitted downstream.

mod cursor;
mod transform;

pub use cursor::{format_timestamp, normalize_timestamp, parse_timestamp, ReplicationCursor};
pub use transform::flatten_record;
