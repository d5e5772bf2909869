//! Pagination types
//!
//! JSON:API documents as the list endpoints return them, and the request
//! shape used to fetch each page.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue, QueryParams, PAGE_LIMIT_PARAM, PAGE_OFFSET_PARAM};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

/// One JSON:API resource object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    /// Resource id; numeric ids are kept as their decimal string
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: String,
    /// JSON:API `type`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Domain fields
    #[serde(default)]
    pub attributes: JsonObject,
    /// Related resources
    #[serde(default)]
    pub relationships: JsonObject,
    /// Resource links
    #[serde(default)]
    pub links: JsonObject,
}

fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    })
}

/// Top-level `links` of a list response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLinks {
    /// Full URL of the next page, absent on the last page
    #[serde(default)]
    pub next: Option<String>,
}

/// A JSON:API list response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonApiDocument {
    /// The page's resource objects; `null` or missing means none
    #[serde(default)]
    pub data: Option<Vec<RawRecord>>,
    /// Pagination links
    #[serde(default)]
    pub links: PageLinks,
    /// Free-form server metadata
    #[serde(default)]
    pub meta: Option<JsonValue>,
}

impl JsonApiDocument {
    /// Parse a response body, rejecting anything that is not a list document
    pub fn from_body(body: JsonValue) -> Result<Self> {
        serde_json::from_value(body)
            .map_err(|e| Error::protocol(format!("unexpected JSON:API document: {e}")))
    }

    /// The `links.next` URL, ignoring empty strings
    pub fn next_link(&self) -> Option<&str> {
        self.links.next.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// The URL and query parameters for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Target URL without a query string
    pub url: Url,
    /// Filters plus page parameters
    pub params: QueryParams,
}

impl PageRequest {
    /// The first page of `endpoint`: the filters plus `page[limit]` and `page[offset]=0`
    pub fn first(endpoint: &str, filters: &QueryParams, page_size: u32) -> Result<Self> {
        let mut url = Url::parse(endpoint)?;
        let mut params = QueryParams::new();
        for (key, value) in url.query_pairs() {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        url.set_query(None);

        params.extend(filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        params.insert(PAGE_LIMIT_PARAM.to_string(), page_size.to_string());
        params.insert(PAGE_OFFSET_PARAM.to_string(), "0".to_string());

        Ok(Self { url, params })
    }

    /// The request a `links.next` value points at. The link's URL replaces
    /// ours and its query parameters override same-named ones; parameters the
    /// link leaves out are kept. Relative links resolve against the current URL.
    pub fn follow_next_link(&self, next: &str) -> Result<Self> {
        let mut url = self.url.join(next)?;

        let mut link_params = QueryParams::new();
        for (key, value) in url.query_pairs() {
            // First occurrence of a repeated key wins
            link_params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        url.set_query(None);

        let mut params = self.params.clone();
        params.extend(link_params);
        Ok(Self { url, params })
    }

    /// The same request with `page[offset]` advanced by `page_size`
    pub fn next_offset(&self, page_size: u32) -> Self {
        let mut params = self.params.clone();
        params.insert(
            PAGE_OFFSET_PARAM.to_string(),
            (self.offset() + u64::from(page_size)).to_string(),
        );
        params.insert(PAGE_LIMIT_PARAM.to_string(), page_size.to_string());
        Self {
            url: self.url.clone(),
            params,
        }
    }

    /// The current `page[offset]`, zero when absent or unparseable
    pub fn offset(&self) -> u64 {
        self.params
            .get(PAGE_OFFSET_PARAM)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Full URL with the query string, for logs
    pub fn display_url(&self) -> String {
        let mut url = self.url.clone();
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        url.to_string()
    }
}

/// Where pagination goes after a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Fetch this request next
    Continue(PageRequest),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// Tracks pagination progress for one resource pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    /// Pages fetched so far
    pub pages: u64,
    /// Records fetched so far
    pub total_fetched: u64,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fetched page of `count` records
    pub fn add_page(&mut self, count: usize) {
        self.pages += 1;
        self.total_fetched += count as u64;
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }
}
