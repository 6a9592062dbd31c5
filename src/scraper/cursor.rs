//! Offset-paginated listings: the [Cursor] state machine and [ResultBatch].

use crate::scraper::client::{Scheduler, LISTING_RETRIES};
use crate::scraper::error::ScraperError;
use crate::scraper::SiteAdapter;
use scraper::Html;
use serde::{Deserialize, Serialize};

/// Where the next listing call starts. `Exhausted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    /// 1-based page number.
    Page(u32),
    Exhausted,
}

impl Cursor {
    pub const FIRST: Cursor = Cursor::Page(1);

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Cursor::Exhausted)
    }

    /// Page number this cursor addresses, or InvalidState for `Exhausted` and `Page(0)`.
    pub fn page(&self) -> Result<u32, ScraperError> {
        match *self {
            Cursor::Page(0) => Err(ScraperError::invalid_state("pages are numbered from 1")),
            Cursor::Page(n) => Ok(n),
            Cursor::Exhausted => Err(ScraperError::invalid_state(
                "cursor is exhausted and cannot be advanced",
            )),
        }
    }

    /// Cursor following page `n`, or `Exhausted` when `n` was the last one.
    pub fn after(n: u32, last: bool) -> Cursor {
        match n.checked_add(1) {
            Some(next) if !last => Cursor::Page(next),
            _ => Cursor::Exhausted,
        }
    }
}

/// One page of results plus where to continue.
///
/// An empty batch is always `Exhausted`; [ResultBatch::new] enforces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultBatch<T> {
    items: Vec<T>,
    next: Cursor,
}

impl<T> ResultBatch<T> {
    pub fn new(items: Vec<T>, next: Cursor) -> Self {
        let next = if items.is_empty() {
            Cursor::Exhausted
        } else {
            next
        };
        Self { items, next }
    }

    pub fn exhausted(items: Vec<T>) -> Self {
        Self::new(items, Cursor::Exhausted)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn next(&self) -> Cursor {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_parts(self) -> (Vec<T>, Cursor) {
        (self.items, self.next)
    }
}

/// Fetch the page `cursor` points at and decide where to continue.
///
/// The next cursor is `Exhausted` when the adapter reports the last page or the page
/// has no items; otherwise it is the following page. Nothing is fetched ahead, so the
/// end may cost one extra empty page but no page is ever skipped.
pub fn fetch_page<A, S>(
    adapter: &A,
    scheduler: &mut S,
    cursor: Cursor,
) -> Result<ResultBatch<A::Item>, ScraperError>
where
    A: SiteAdapter + ?Sized,
    S: Scheduler + ?Sized,
{
    let page = cursor.page()?;
    let request = adapter.build_listing_request(page);
    tracing::debug!(site = adapter.name(), page, url = %request.url, "fetching listing page");
    let context = format!("listing page {}", page);
    let body = scheduler
        .schedule(&request, LISTING_RETRIES)?
        .into_checked_body(&context)?;
    let doc = Html::parse_document(&body);
    let items = adapter.extract_items(&doc)?;
    let last = adapter.is_last_page(&doc, page);
    Ok(ResultBatch::new(items, Cursor::after(page, last)))
}

/// Drive a cursor from `start` to exhaustion, concatenating items in page order.
///
/// `progress` is called after each page with the page number and the running item count.
pub fn drain<A, S>(
    adapter: &A,
    scheduler: &mut S,
    start: Cursor,
    progress: Option<&dyn Fn(u32, usize)>,
) -> Result<Vec<A::Item>, ScraperError>
where
    A: SiteAdapter + ?Sized,
    S: Scheduler + ?Sized,
{
    let mut all = Vec::new();
    let mut cursor = start;
    while let Cursor::Page(page) = cursor {
        let (items, next) = fetch_page(adapter, scheduler, cursor)?.into_parts();
        all.extend(items);
        if let Some(p) = progress {
            p(page, all.len());
        }
        cursor = next;
    }
    Ok(all)
}
