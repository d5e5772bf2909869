//! Record flattening

use crate::pagination::RawRecord;
use crate::types::{JsonObject, JsonValue};

/// Flatten a JSON:API resource object into an output record.
///
/// The record holds `id`, `type` and the attributes at the top level, so the
/// replication key ends up where downstream consumers look for it. An
/// attribute named `id` or `type` wins over the envelope value. When
/// `fields` is non-empty only those attributes are kept; `id`, `type` and
/// the replication key are always kept.
pub fn flatten_record(raw: RawRecord, replication_key: Option<&str>, fields: &[String]) -> JsonObject {
    let mut record = JsonObject::new();
    record.insert("id".to_string(), JsonValue::String(raw.id));
    record.insert("type".to_string(), JsonValue::String(raw.kind));

    for (name, value) in raw.attributes {
        let keep = fields.is_empty()
            || fields.iter().any(|f| *f == name)
            || replication_key == Some(name.as_str());
        if keep {
            record.insert(name, value);
        }
    }

    record
}
