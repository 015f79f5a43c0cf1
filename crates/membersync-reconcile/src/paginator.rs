//! Cursor-driven aggregation of paginated list endpoints.

use std::collections::HashSet;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::PaginationError;
use crate::types::{Cursor, Page};

/// Follows continuation cursors until the server signals the last page.
///
/// Termination is decided only by the page's continuation signal; the
/// advertised total is checked for logging but never used to stop early.
#[derive(Debug, Clone, Default)]
pub struct Paginator {
    cancel: CancellationToken,
}

impl Paginator {
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Collect every item across all pages.
    ///
    /// `list_page` receives `None` for the first page and the previous page's
    /// cursor afterwards. Any error aborts the walk; no partial collection is
    /// returned.
    pub async fn fetch_all<T, E, F, Fut>(
        &self,
        label: &str,
        mut list_page: F,
    ) -> Result<Vec<T>, PaginationError<E>>
    where
        F: FnMut(Option<Cursor>) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        let mut items = Vec::new();
        let mut cursor: Option<Cursor> = None;
        let mut seen: HashSet<Cursor> = HashSet::new();
        let mut advertised_total = None;
        let mut pages: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(PaginationError::Cancelled);
            }

            let page = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(PaginationError::Cancelled),
                result = list_page(cursor.clone()) => result.map_err(PaginationError::Remote)?,
            };
            pages += 1;

            if page.advertised_total.is_some() {
                advertised_total = page.advertised_total;
            }
            let next = page.continuation().cloned();
            items.extend(page.items);

            match next {
                None => break,
                Some(next) if !seen.insert(next.clone()) => {
                    warn!(list = label, cursor = %next, pages, "Server repeated pagination cursor");
                    return Err(PaginationError::Stalled { cursor: next });
                }
                Some(next) => cursor = Some(next),
            }
        }

        if let Some(total) = advertised_total {
            if total != items.len() as u64 {
                warn!(
                    list = label,
                    advertised_total = total,
                    collected = items.len(),
                    "Advertised total disagrees with collected items"
                );
            }
        }

        debug!(list = label, pages, items = items.len(), "Pagination complete");
        Ok(items)
    }
}
