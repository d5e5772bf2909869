//! Pagination module
//!
//! Walks JSON:API list endpoints page by page. Two termination strategies
//! exist and one is chosen per endpoint:
//!
//! - **NextLink**: follow `links.next` until it is absent or a page is empty
//! - **ShortPage**: advance `page[offset]` until a page comes back short
//!
//! Records are yielded in server order; nothing is deduplicated.

mod paginator;
mod types;

pub use paginator::{next_page, PageCursor, Paginator};
pub use types::{JsonApiDocument, NextPage, PageLinks, PageRequest, PaginationState, RawRecord};
