//! Output module
//!
//! Serializes sync messages for downstream consumers, one JSON object per
//! line:
//!
//! - `{"type":"RECORD","stream":"products","record":{...}}`
//! - `{"type":"STATE","value":{...}}`
//!
//! Log messages go to the tracing subscriber (stderr), keeping stdout a
//! clean message stream.

mod writer;

pub use writer::JsonLinesWriter;
