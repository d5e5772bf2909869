//! Page-by-page walking of a JSON:API listing
//!
//! Pages are fetched strictly one after another since each request may
//! depend on the previous page's `links.next`. A pass is restartable only
//! from the first page.

use super::types::{JsonApiDocument, NextPage, PageRequest, PaginationState, RawRecord};
use crate::error::{Error, Result};
use crate::http::{HttpExecutor, RequestConfig};
use crate::types::{PageTermination, QueryParams};
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, warn};

/// Decide what follows a page of `count` records fetched with `request`
pub fn next_page(
    termination: PageTermination,
    request: &PageRequest,
    document: &JsonApiDocument,
    count: usize,
    page_size: u32,
) -> Result<NextPage> {
    match termination {
        PageTermination::NextLink => {
            if count == 0 {
                return Ok(NextPage::Done);
            }
            let Some(link) = document.next_link() else {
                return Ok(NextPage::Done);
            };
            let next = request.follow_next_link(link)?;
            if &next == request {
                warn!(url = %next.display_url(), "next link points at the current page, stopping");
                return Ok(NextPage::Done);
            }
            Ok(NextPage::Continue(next))
        }
        PageTermination::ShortPage => {
            if count < page_size as usize {
                Ok(NextPage::Done)
            } else {
                Ok(NextPage::Continue(request.next_offset(page_size)))
            }
        }
    }
}

/// Stateful walk over the pages of one listing
#[derive(Debug, Clone)]
pub struct PageCursor {
    next: Option<PageRequest>,
    termination: PageTermination,
    page_size: u32,
    timeout: Option<Duration>,
    state: PaginationState,
}

impl PageCursor {
    /// Start at `first`
    pub fn new(first: PageRequest, termination: PageTermination, page_size: u32) -> Self {
        Self {
            next: Some(first),
            termination,
            page_size,
            timeout: None,
            state: PaginationState::new(),
        }
    }

    /// Use a specific read timeout for every page
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Progress so far
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Fetch the next page. `Ok(None)` once the listing is exhausted.
    pub async fn next_page(&mut self, executor: &HttpExecutor) -> Result<Option<Vec<RawRecord>>> {
        let Some(request) = self.next.take() else {
            return Ok(None);
        };

        let mut config = RequestConfig::new().query_params(request.params.clone());
        if let Some(timeout) = self.timeout {
            config = config.timeout(timeout);
        }

        let response = executor
            .execute(Method::GET, request.url.as_str(), config)
            .await?;

        let document = match response.body {
            Some(body) => JsonApiDocument::from_body(body)?,
            None => JsonApiDocument::default(),
        };
        let count = document.data.as_ref().map_or(0, Vec::len);
        self.state.add_page(count);

        debug!(
            url = %request.display_url(),
            page = self.state.pages,
            records = count,
            "fetched page"
        );

        match next_page(self.termination, &request, &document, count, self.page_size)? {
            NextPage::Continue(next) => self.next = Some(next),
            NextPage::Done => self.state.mark_done(),
        }

        Ok(Some(document.data.unwrap_or_default()))
    }
}

/// Produces lazy record sequences for listings
#[derive(Debug, Clone, Copy)]
pub struct Paginator<'a> {
    executor: &'a HttpExecutor,
    page_size: u32,
    termination: PageTermination,
    timeout: Option<Duration>,
}

impl<'a> Paginator<'a> {
    /// Paginate through `executor` with the given page size
    pub fn new(executor: &'a HttpExecutor, page_size: u32) -> Self {
        Self {
            executor,
            page_size,
            termination: PageTermination::default(),
            timeout: None,
        }
    }

    /// Choose how the last page is detected
    #[must_use]
    pub fn termination(mut self, termination: PageTermination) -> Self {
        self.termination = termination;
        self
    }

    /// Override the executor's read timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// A page cursor over `endpoint` with `filters`
    pub fn pages(&self, endpoint: &str, filters: &QueryParams) -> Result<PageCursor> {
        if self.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be greater than zero"));
        }
        let first = PageRequest::first(endpoint, filters, self.page_size)?;
        Ok(PageCursor::new(first, self.termination, self.page_size).with_timeout(self.timeout))
    }

    /// Every record of the listing, in server order. The stream ends after
    /// the last page or at the first error.
    pub fn paginate(
        &self,
        endpoint: &str,
        filters: &QueryParams,
    ) -> Result<impl Stream<Item = Result<RawRecord>> + 'a> {
        let cursor = self.pages(endpoint, filters)?;
        let executor = self.executor;

        let pages = stream::try_unfold(cursor, move |mut cursor| async move {
            let page = cursor.next_page(executor).await?;
            Ok::<_, Error>(page.map(|records| {
                (
                    stream::iter(records.into_iter().map(Ok::<_, Error>)),
                    cursor,
                )
            }))
        });

        Ok(pages.try_flatten())
    }
}
