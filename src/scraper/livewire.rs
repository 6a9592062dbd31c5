//! Continuation through a server-rendered reactive component (Livewire message protocol).
//!
//! Listings rendered by such a component have no stable page URL. Instead the page is
//! loaded once, its session tokens are captured, and each further page (or a search) is
//! requested by POSTing one component update to `/livewire/message/<component>`; the
//! response carries the re-rendered HTML fragment under `effects.html`.
//!
//! The captured `serverMemo` and `fingerprint` are reused unchanged for every round.

use crate::scraper::client::{Request, Scheduler, LISTING_RETRIES};
use crate::scraper::cursor::{Cursor, ResultBatch};
use crate::scraper::error::ScraperError;
use crate::scraper::session::TokenSession;
use crate::scraper::SiteAdapter;
use rand::distributions::Alphanumeric;
use rand::Rng;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const CALL_ID_LEN: usize = 8;
const PAGINATION_METHOD: &str = "gotoPage";
const PAGINATION_PARAM: &str = "page";
const SEARCH_FIELD: &str = "query";

/// One component update. Exactly one is sent per round.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum Update {
    #[serde(rename = "callMethod")]
    CallMethod {
        id: String,
        method: String,
        params: (u32, String),
    },
    #[serde(rename = "syncInput")]
    SyncInput {
        id: String,
        name: String,
        value: String,
    },
}

impl Update {
    /// `gotoPage(page, "page")`, used for pagination.
    pub fn goto_page(page: u32) -> Self {
        Update::CallMethod {
            id: call_id(),
            method: PAGINATION_METHOD.to_string(),
            params: (page, PAGINATION_PARAM.to_string()),
        }
    }

    /// Sets the component's `query` input, used for search. The value is lower-cased.
    pub fn sync_query(query: &str) -> Self {
        Update::SyncInput {
            id: call_id(),
            name: SEARCH_FIELD.to_string(),
            value: query.to_lowercase(),
        }
    }
}

/// Random opaque id for one update; only uniqueness matters.
pub fn call_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CALL_ID_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

#[derive(Serialize)]
struct Message<'a> {
    fingerprint: &'a Value,
    #[serde(rename = "serverMemo")]
    server_memo: &'a Value,
    updates: [&'a Update; 1],
}

#[derive(Deserialize)]
struct MessageResponse {
    effects: Option<Effects>,
}

#[derive(Deserialize)]
struct Effects {
    html: Option<String>,
}

/// Endpoint for the session's component under `base_url`.
pub fn message_url(base_url: &str, session: &TokenSession) -> String {
    format!(
        "{}/livewire/message/{}",
        base_url.trim_end_matches('/'),
        session.component_name()
    )
}

/// Build the POST for one update.
pub fn message_request(
    base_url: &str,
    session: &TokenSession,
    update: &Update,
) -> Result<Request, ScraperError> {
    let url = message_url(base_url, session);
    let body = serde_json::to_string(&Message {
        fingerprint: session.fingerprint(),
        server_memo: session.server_memo(),
        updates: [update],
    })
    .map_err(|e| ScraperError::Request {
        url: url.clone(),
        reason: e.to_string(),
    })?;
    Ok(Request::post(url, body)
        .header("Content-Type", "application/json")
        .header("X-Livewire", "true")
        .header("X-CSRF-TOKEN", session.csrf_token()))
}

/// Send one update and return the rendered fragment.
///
/// A response without a non-empty `effects.html` is a protocol failure, not a retry case.
pub fn send_update<S: Scheduler + ?Sized>(
    scheduler: &mut S,
    base_url: &str,
    session: &TokenSession,
    update: &Update,
    stage: &'static str,
) -> Result<String, ScraperError> {
    let request = message_request(base_url, session, update)?;
    tracing::debug!(stage, url = %request.url, "sending component update");
    let body = scheduler
        .schedule(&request, LISTING_RETRIES)?
        .into_checked_body(stage)?;
    let no_data = |reason: String| ScraperError::ProtocolResponse {
        stage,
        url: request.url.clone(),
        reason,
    };
    let parsed: MessageResponse =
        serde_json::from_str(&body).map_err(|e| no_data(format!("response is not JSON: {}", e)))?;
    parsed
        .effects
        .and_then(|e| e.html)
        .filter(|html| !html.trim().is_empty())
        .ok_or_else(|| no_data("effects.html is missing".to_string()))
}

fn load_bootstrap_page<A, S>(adapter: &A, scheduler: &mut S) -> Result<Html, ScraperError>
where
    A: SiteAdapter + ?Sized,
    S: Scheduler + ?Sized,
{
    let request = adapter.build_listing_request(1);
    tracing::debug!(site = adapter.name(), url = %request.url, "loading component page");
    let body = scheduler
        .schedule(&request, LISTING_RETRIES)?
        .into_checked_body("component page")?;
    Ok(Html::parse_document(&body))
}

/// Paginated listing driven through component updates.
///
/// Owns the captured session and the cursor; rounds are strictly sequential.
#[derive(Debug)]
pub struct AjaxContinuation<'a, A: SiteAdapter + ?Sized> {
    adapter: &'a A,
    session: TokenSession,
    cursor: Cursor,
}

impl<'a, A: SiteAdapter + ?Sized> AjaxContinuation<'a, A> {
    /// Load the listing page, capture its session, and return its own items as page 1.
    ///
    /// Fails with ProtocolBootstrap before any POST if the tokens are missing.
    pub fn bootstrap<S: Scheduler + ?Sized>(
        adapter: &'a A,
        scheduler: &mut S,
    ) -> Result<(Self, ResultBatch<A::Item>), ScraperError> {
        let doc = load_bootstrap_page(adapter, scheduler)?;
        let session = adapter.extract_session_tokens(&doc)?;
        let first = ResultBatch::new(adapter.extract_items(&doc)?, Cursor::Page(2));
        let continuation = Self {
            adapter,
            session,
            cursor: first.next(),
        };
        Ok((continuation, first))
    }

    /// Resume from an already captured session.
    pub fn from_session(adapter: &'a A, session: TokenSession, cursor: Cursor) -> Self {
        Self {
            adapter,
            session,
            cursor,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn session(&self) -> &TokenSession {
        &self.session
    }

    /// Request the page under the cursor. An empty fragment or any failure exhausts the
    /// continuation; advancing an exhausted one is InvalidState.
    pub fn advance<S: Scheduler + ?Sized>(
        &mut self,
        scheduler: &mut S,
    ) -> Result<ResultBatch<A::Item>, ScraperError> {
        let page = self.cursor.page()?;
        let update = Update::goto_page(page);
        let adapter = self.adapter;
        let items = send_update(
            scheduler,
            adapter.base_url(),
            &self.session,
            &update,
            "Chapter list",
        )
        .and_then(|fragment| adapter.extract_items(&Html::parse_fragment(&fragment)));
        let items = match items {
            Ok(items) => items,
            Err(e) => {
                self.cursor = Cursor::Exhausted;
                return Err(e);
            }
        };
        let batch = ResultBatch::new(items, Cursor::after(page, false));
        tracing::debug!(page, items = batch.items().len(), "component page received");
        self.cursor = batch.next();
        Ok(batch)
    }

    /// Advance until exhausted, concatenating items in page order.
    pub fn drain<S: Scheduler + ?Sized>(
        mut self,
        scheduler: &mut S,
    ) -> Result<Vec<A::Item>, ScraperError> {
        let mut all = Vec::new();
        while !self.cursor.is_exhausted() {
            let (items, _) = self.advance(scheduler)?.into_parts();
            all.extend(items);
        }
        Ok(all)
    }
}

/// Every item of a component-rendered listing: page 1 from the page itself, then
/// `gotoPage` rounds until an empty fragment.
pub fn collect_all<A, S>(adapter: &A, scheduler: &mut S) -> Result<Vec<A::Item>, ScraperError>
where
    A: SiteAdapter + ?Sized,
    S: Scheduler + ?Sized,
{
    let (continuation, first) = AjaxContinuation::bootstrap(adapter, scheduler)?;
    let (mut items, _) = first.into_parts();
    items.extend(continuation.drain(scheduler)?);
    Ok(items)
}

/// One search round: load the page, capture its session, sync the query input, and
/// extract the results from the returned fragment. Always exhausted afterwards.
pub fn search<A, S>(
    adapter: &A,
    scheduler: &mut S,
    query: &str,
) -> Result<ResultBatch<A::Item>, ScraperError>
where
    A: SiteAdapter + ?Sized,
    S: Scheduler + ?Sized,
{
    let doc = load_bootstrap_page(adapter, scheduler)?;
    let session = adapter.extract_session_tokens(&doc)?;
    let update = Update::sync_query(query);
    let fragment = send_update(scheduler, adapter.base_url(), &session, &update, "Search")?;
    let items = adapter.extract_items(&Html::parse_fragment(&fragment))?;
    Ok(ResultBatch::exhausted(items))
}
