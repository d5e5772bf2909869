//! Resource catalog
//!
//! Static descriptors for the Optiply entities the tap extracts.

use crate::error::{Error, Result};
use crate::types::PageTermination;

/// Primary key shared by every Optiply resource
pub const PRIMARY_KEY: &str = "id";

/// Replication key shared by every Optiply resource
pub const REPLICATION_KEY: &str = "updatedAt";

/// Everything the sync needs to know about one resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Stream name as it appears in output and state
    pub name: String,
    /// Path below the API root, without a leading slash
    pub endpoint_path: String,
    /// Primary key field
    pub primary_key: String,
    /// Field tracked for incremental sync, if any
    pub replication_key: Option<String>,
    /// Whether requests carry `filter[accountId]`
    pub account_scoped: bool,
    /// Whether pages are slow enough to need the long read timeout
    pub large_pages: bool,
    /// How the last page is detected
    pub termination: PageTermination,
    /// Attributes to keep; empty keeps all of them
    pub fields: Vec<String>,
}

impl ResourceDescriptor {
    /// An account-scoped, incrementally replicated resource
    pub fn new(name: impl Into<String>, endpoint_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint_path: endpoint_path.into(),
            primary_key: PRIMARY_KEY.to_string(),
            replication_key: Some(REPLICATION_KEY.to_string()),
            account_scoped: true,
            large_pages: false,
            termination: PageTermination::NextLink,
            fields: Vec::new(),
        }
    }

    /// Mark as returning large pages
    #[must_use]
    pub fn large_pages(mut self) -> Self {
        self.large_pages = true;
        self
    }

    /// Drop the account filter
    #[must_use]
    pub fn unscoped(mut self) -> Self {
        self.account_scoped = false;
        self
    }

    /// Use a different termination strategy
    #[must_use]
    pub fn termination(mut self, termination: PageTermination) -> Self {
        self.termination = termination;
        self
    }

    /// Keep only these attributes
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Full URL of the listing below `base_url`
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        )
    }
}

/// The built-in Optiply resources, in sync order
pub fn builtin_resources() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor::new("products", "products").large_pages(),
        ResourceDescriptor::new("suppliers", "suppliers"),
        ResourceDescriptor::new("supplierProducts", "supplierProducts"),
        ResourceDescriptor::new("sellOrders", "sellOrders"),
        ResourceDescriptor::new("sellOrderLines", "sellOrderLines").large_pages(),
        ResourceDescriptor::new("buyOrders", "buyOrders"),
        ResourceDescriptor::new("buyOrderLines", "buyOrderLines"),
        ResourceDescriptor::new("receiptLines", "receiptLines"),
        ResourceDescriptor::new("productCompositions", "productCompositions"),
        ResourceDescriptor::new("promotions", "promotions"),
        ResourceDescriptor::new("promotionProducts", "promotionProducts"),
    ]
}

/// Look up a built-in resource by name
pub fn find_resource(name: &str) -> Option<ResourceDescriptor> {
    builtin_resources().into_iter().find(|r| r.name == name)
}

/// Resolve a comma-separated selection (`None` or blank selects everything).
/// Catalog order is kept and duplicates collapse.
pub fn select_resources(selection: Option<&str>) -> Result<Vec<ResourceDescriptor>> {
    let all = builtin_resources();
    let Some(selection) = selection.filter(|s| !s.trim().is_empty()) else {
        return Ok(all);
    };

    let wanted: Vec<&str> = selection
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(unknown) = wanted.iter().find(|w| !all.iter().any(|r| r.name == **w)) {
        return Err(Error::UnknownResource {
            name: (*unknown).to_string(),
        });
    }

    Ok(all
        .into_iter()
        .filter(|r| wanted.contains(&r.name.as_str()))
        .collect())
}
