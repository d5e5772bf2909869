//! Common types used throughout the tap
//!
//! Shared type aliases, wire constants, and small enums used by more than
//! one module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Query parameters for one request. Keys are unique and iterate in a
/// stable order, which keeps request URLs reproducible in logs and tests.
pub type QueryParams = BTreeMap<String, String>;

// ============================================================================
// Wire Constants
// ============================================================================

/// Media type for JSON:API requests and responses
pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.optiply.com/v1";

/// Default OAuth2 token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://dashboard.optiply.nl/api/auth/oauth/token";

/// Query parameter carrying the page size
pub const PAGE_LIMIT_PARAM: &str = "page[limit]";

/// Query parameter carrying the page offset
pub const PAGE_OFFSET_PARAM: &str = "page[offset]";

/// Query parameter scoping a request to one account
pub const ACCOUNT_FILTER_PARAM: &str = "filter[accountId]";

/// Build the `filter[<key>][GT]` parameter name for a replication key
pub fn greater_than_filter(replication_key: &str) -> String {
    format!("filter[{replication_key}][GT]")
}

// ============================================================================
// Page Termination
// ============================================================================

/// How the end of a paginated listing is detected
///
/// One strategy is picked per endpoint. Mixing them on one call path can
/// loop forever when an exactly-full last page is read as "more data".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageTermination {
    /// Follow `links.next` until it is absent (or a page comes back empty)
    #[default]
    NextLink,
    /// Advance `page[offset]` by the page size until a page is shorter than requested
    ShortPage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greater_than_filter() {
        assert_eq!(greater_than_filter("updatedAt"), "filter[updatedAt][GT]");
    }

    #[test]
    fn test_page_termination_default_and_serde() {
        assert_eq!(PageTermination::default(), PageTermination::NextLink);
        let parsed: PageTermination = serde_json::from_str("\"short_page\"").unwrap();
        assert_eq!(parsed, PageTermination::ShortPage);
    }

    #[test]
    fn test_query_params_are_ordered() {
        let mut params = QueryParams::new();
        params.insert("page[offset]".to_string(), "0".to_string());
        params.insert("filter[accountId]".to_string(), "7".to_string());
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["filter[accountId]", "page[offset]"]);
    }
}
