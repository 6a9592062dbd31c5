//! Site adapters and listing continuation: site detection, the adapter trait, the shared
//! scheduler, and dispatch to each site.

mod client;
pub mod cursor;
mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod lightnovelpub;
pub mod livewire;
pub mod reaperscans;
pub mod session;

pub use client::{
    Method, PoliteClient, PoliteClientBuilder, Request, Response, Scheduler, LISTING_RETRIES,
    PROBE_RETRIES,
};
pub use cursor::{Cursor, ResultBatch};
pub use error::{ErrorClass, ScraperError};
pub use session::TokenSession;

use crate::layout::LayoutConfig;
use crate::model::{ChapterDetails, ChapterEntry, HomeSection, SeriesDetails, Tile};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

/// One paginated listing on one site: how to request page N and how to read items
/// out of a page or a component fragment.
///
/// The same `extract_items` serves both continuation strategies, so an adapter that
/// switches from page URLs to component updates keeps its extractor.
pub trait SiteAdapter {
    type Item;

    /// Short site name for logs.
    fn name(&self) -> &'static str;

    /// Scheme and host, no trailing slash.
    fn base_url(&self) -> &str;

    /// Request for page `page` (1-based). Component listings ignore `page` and return
    /// the page that hosts the component.
    fn build_listing_request(&self, page: u32) -> Request;

    fn extract_items(&self, doc: &Html) -> Result<Vec<Self::Item>, ScraperError>;

    /// Whether `doc` is the last page. Defaults to false; an empty page still ends
    /// the listing.
    fn is_last_page(&self, _doc: &Html, _page: u32) -> bool {
        false
    }

    /// Session tokens for component listings.
    fn extract_session_tokens(&self, doc: &Html) -> Result<TokenSession, ScraperError> {
        TokenSession::from_document(doc, session::ANY_COMPONENT_SELECTOR)
    }
}

/// Supported site. Used for dispatch and for the --site override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    LightNovelPub,
    ReaperScans,
}

impl Site {
    pub fn base_url(&self) -> &'static str {
        match self {
            Site::LightNovelPub => lightnovelpub::BASE_URL,
            Site::ReaperScans => reaperscans::BASE_URL,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Site::LightNovelPub => "lightnovelpub",
            Site::ReaperScans => "reaperscans",
        }
    }

    /// Landing page: the source of home sections and the page an anti-bot check guards.
    pub fn home_url(&self) -> String {
        match self {
            Site::LightNovelPub => format!("{}/hot", lightnovelpub::BASE_URL),
            Site::ReaperScans => reaperscans::BASE_URL.to_string(),
        }
    }
}

/// Resolve which site to use from URL and optional override.
pub fn resolve_site(url_input: &str, override_site: Option<Site>) -> Result<Site, ScraperError> {
    if let Some(site) = override_site {
        return Ok(site);
    }
    let url = Url::parse(url_input).map_err(|e| ScraperError::InvalidUrl {
        input: url_input.to_string(),
        reason: e.to_string(),
    })?;
    let host = url.host_str().ok_or_else(|| ScraperError::InvalidUrl {
        input: url_input.to_string(),
        reason: "URL has no host".to_string(),
    })?;
    if host.contains("lightnovelpub.com") {
        Ok(Site::LightNovelPub)
    } else if host.contains("reaperscans.com") {
        Ok(Site::ReaperScans)
    } else {
        Err(ScraperError::UnrecognizedHost {
            host: host.to_string(),
        })
    }
}

/// Series id from a series or chapter URL on `site`, or `input` itself when it is not
/// a URL.
pub fn series_id(site: Site, input: &str) -> Result<String, ScraperError> {
    let url = match Url::parse(input) {
        Ok(url) => url,
        Err(_) => return Ok(input.trim_matches('/').to_string()),
    };
    let prefix = match site {
        Site::LightNovelPub => "novel",
        Site::ReaperScans => "comics",
    };
    let mut segments = url.path_segments().into_iter().flatten();
    segments
        .by_ref()
        .find(|s| *s == prefix)
        .and_then(|_| segments.next())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ScraperError::InvalidUrl {
            input: input.to_string(),
            reason: format!("expected /{}/<series> in the path", prefix),
        })
}

/// Hit the site's landing page with the short probe budget, to surface an anti-bot
/// challenge before a long listing run.
pub fn probe<S: Scheduler + ?Sized>(site: Site, scheduler: &mut S) -> Result<(), ScraperError> {
    let url = site.home_url();
    tracing::debug!(site = site.name(), %url, "probing site");
    scheduler
        .schedule(&Request::get(url), PROBE_RETRIES)?
        .into_checked_body("home page")?;
    Ok(())
}

/// Shareable URL of a series, also the page its details are read from.
pub fn share_url(site: Site, series_id: &str) -> String {
    match site {
        Site::LightNovelPub => format!("{}/novel/{}", site.base_url(), series_id),
        Site::ReaperScans => format!("{}/comics/{}", site.base_url(), series_id),
    }
}

/// Sections of the site's home page. LightNovelPub's ranking page gets the probe budget,
/// since it is also the page its anti-bot check guards.
pub fn home_sections<S: Scheduler + ?Sized>(
    site: Site,
    scheduler: &mut S,
) -> Result<Vec<HomeSection>, ScraperError> {
    let retries = match site {
        Site::LightNovelPub => PROBE_RETRIES,
        Site::ReaperScans => LISTING_RETRIES,
    };
    let body = scheduler
        .schedule(&Request::get(site.home_url()), retries)?
        .into_checked_body("home page")?;
    let doc = Html::parse_document(&body);
    let sections = match site {
        Site::LightNovelPub => lightnovelpub::extract_home_sections(&doc)?,
        Site::ReaperScans => reaperscans::extract_home_sections(&doc)?,
    };
    tracing::debug!(site = site.name(), sections = sections.len(), "home sections");
    Ok(sections)
}

/// Title, cover and metadata from a series' landing page.
pub fn series_details<S: Scheduler + ?Sized>(
    site: Site,
    scheduler: &mut S,
    series_id: &str,
) -> Result<SeriesDetails, ScraperError> {
    let url = share_url(site, series_id);
    let body = scheduler
        .schedule(&Request::get(url.as_str()), LISTING_RETRIES)?
        .into_checked_body("series page")?;
    let doc = Html::parse_document(&body);
    let mut details = match site {
        Site::LightNovelPub => lightnovelpub::extract_series_details(&doc, series_id)?,
        Site::ReaperScans => reaperscans::extract_series_details(&doc, series_id)?,
    };
    details.url = url;
    Ok(details)
}

/// One page of the site's series listing. `section` picks a LightNovelPub ranking
/// (`hot`, `latest`, ...); ReaperScans has a single latest listing.
pub fn listing_page<S: Scheduler + ?Sized>(
    site: Site,
    scheduler: &mut S,
    section: Option<&str>,
    cursor: Cursor,
) -> Result<ResultBatch<Tile>, ScraperError> {
    match site {
        Site::LightNovelPub => {
            let adapter = lightnovelpub::SectionListing::new(section.unwrap_or("latest"));
            cursor::fetch_page(&adapter, scheduler, cursor)
        }
        Site::ReaperScans => cursor::fetch_page(&reaperscans::LatestListing, scheduler, cursor),
    }
}

/// The whole series listing from `start`.
pub fn listing<S: Scheduler + ?Sized>(
    site: Site,
    scheduler: &mut S,
    section: Option<&str>,
    start: Cursor,
    progress: Option<&dyn Fn(u32, usize)>,
) -> Result<Vec<Tile>, ScraperError> {
    match site {
        Site::LightNovelPub => {
            let adapter = lightnovelpub::SectionListing::new(section.unwrap_or("latest"));
            cursor::drain(&adapter, scheduler, start, progress)
        }
        Site::ReaperScans => cursor::drain(&reaperscans::LatestListing, scheduler, start, progress),
    }
}

/// Every chapter of a series, in the order the site lists them.
pub fn all_chapters<S: Scheduler + ?Sized>(
    site: Site,
    scheduler: &mut S,
    series_id: &str,
    progress: Option<&dyn Fn(u32, usize)>,
) -> Result<Vec<ChapterEntry>, ScraperError> {
    match site {
        Site::LightNovelPub => {
            let adapter = lightnovelpub::ChapterListing::new(series_id);
            cursor::drain(&adapter, scheduler, Cursor::FIRST, progress)
        }
        Site::ReaperScans => {
            let adapter = reaperscans::ChapterListing::new(series_id);
            livewire::collect_all(&adapter, scheduler)
        }
    }
}

/// Search by title. A single exhausted batch on both sites.
pub fn search<S: Scheduler + ?Sized>(
    site: Site,
    scheduler: &mut S,
    query: &str,
) -> Result<ResultBatch<Tile>, ScraperError> {
    match site {
        Site::LightNovelPub => lightnovelpub::search(scheduler, query),
        Site::ReaperScans => livewire::search(&reaperscans::SearchListing, scheduler, query),
    }
}

/// Fetch one chapter and turn it into reader pages: page locators for laid-out prose,
/// image URLs for comics.
pub fn chapter_details<S: Scheduler + ?Sized>(
    site: Site,
    scheduler: &mut S,
    series_id: &str,
    chapter_id: &str,
    config: &LayoutConfig,
) -> Result<ChapterDetails, ScraperError> {
    match site {
        Site::LightNovelPub => {
            lightnovelpub::chapter_details(scheduler, series_id, chapter_id, config)
        }
        Site::ReaperScans => reaperscans::chapter_details(scheduler, series_id, chapter_id),
    }
}

pub(crate) fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::ParsePage {
        message: format!("invalid selector {:?}: {}", sel, e),
    })
}

/// Image URL, preferring the lazy-load `data-src` over a placeholder `src`.
pub(crate) fn image_src(img: ElementRef<'_>) -> Option<String> {
    ["data-src", "src"]
        .iter()
        .filter_map(|a| img.value().attr(a))
        .map(str::trim)
        .find(|s| !s.is_empty() && !s.starts_with("data:"))
        .map(str::to_string)
}

/// Text of the first element under `root` matching `sel` that has any.
pub(crate) fn first_text(root: ElementRef<'_>, sel: &str) -> Result<Option<String>, ScraperError> {
    let sel = parse_selector(sel)?;
    Ok(root.select(&sel).map(element_text).find(|t| !t.is_empty()))
}

/// Value of the first `row` whose `label` element mentions `label_text`, e.g.
/// `<span><strong>Ongoing</strong><small>Status</small></span>`.
pub(crate) fn labelled_text(
    root: ElementRef<'_>,
    row: &str,
    label: &str,
    value: &str,
    label_text: &str,
) -> Result<Option<String>, ScraperError> {
    let row_sel = parse_selector(row)?;
    let label_sel = parse_selector(label)?;
    let value_sel = parse_selector(value)?;
    let wanted = label_text.to_lowercase();
    Ok(root.select(&row_sel).find_map(|r| {
        let name = r.select(&label_sel).next().map(element_text)?;
        if !name.to_lowercase().contains(&wanted) {
            return None;
        }
        r.select(&value_sel)
            .next()
            .map(element_text)
            .filter(|v| !v.is_empty())
    }))
}

/// Collapsed, trimmed text content of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::fake::FakeScheduler;

    #[test]
    fn site_detection_lightnovelpub() -> Result<(), ScraperError> {
        let site = resolve_site("https://www.lightnovelpub.com/novel/some-novel", None)?;
        assert_eq!(site, Site::LightNovelPub);
        Ok(())
    }

    #[test]
    fn site_detection_reaperscans() -> Result<(), ScraperError> {
        let site = resolve_site("https://reaperscans.com/comics/4099-some-comic", None)?;
        assert_eq!(site, Site::ReaperScans);
        Ok(())
    }

    #[test]
    fn site_detection_unrecognized_host_errors() -> Result<(), String> {
        let result = resolve_site("https://example.com/foo", None);
        match &result {
            Err(ScraperError::UnrecognizedHost { host }) if host == "example.com" => Ok(()),
            _ => Err(format!("expected UnrecognizedHost, got {:?}", result)),
        }
    }

    #[test]
    fn site_detection_invalid_url_errors() -> Result<(), String> {
        let result = resolve_site("not-a-url", None);
        match &result {
            Err(ScraperError::InvalidUrl { input, .. }) if input == "not-a-url" => Ok(()),
            _ => Err(format!("expected InvalidUrl, got {:?}", result)),
        }
    }

    #[test]
    fn site_override_ignores_url_host() -> Result<(), ScraperError> {
        let site = resolve_site("https://example.com/foo", Some(Site::ReaperScans))?;
        assert_eq!(site, Site::ReaperScans);
        Ok(())
    }

    #[test]
    fn series_id_from_url_or_bare_id() -> Result<(), ScraperError> {
        assert_eq!(
            series_id(
                Site::LightNovelPub,
                "https://www.lightnovelpub.com/novel/shadow-slave/chapter-3"
            )?,
            "shadow-slave"
        );
        assert_eq!(
            series_id(Site::ReaperScans, "https://reaperscans.com/comics/4099-omniscient-reader")?,
            "4099-omniscient-reader"
        );
        assert_eq!(series_id(Site::ReaperScans, "4099-omniscient-reader/")?, "4099-omniscient-reader");
        assert!(matches!(
            series_id(Site::LightNovelPub, "https://www.lightnovelpub.com/hot"),
            Err(ScraperError::InvalidUrl { .. })
        ));
        Ok(())
    }

    #[test]
    fn probe_uses_short_budget_and_reports_challenge() {
        let mut sched = FakeScheduler::new().respond(503, "<html>challenge</html>");
        let result = probe(Site::LightNovelPub, &mut sched);
        assert!(matches!(
            result,
            Err(ScraperError::UpstreamBlocked { status: 503, .. })
        ));
        assert_eq!(sched.requests[0].0.url, "https://www.lightnovelpub.com/hot");
        assert_eq!(sched.requests[0].1, PROBE_RETRIES);
    }

    #[test]
    fn share_urls_point_at_series_pages() {
        assert_eq!(
            share_url(Site::LightNovelPub, "shadow-slave"),
            "https://www.lightnovelpub.com/novel/shadow-slave"
        );
        assert_eq!(
            share_url(Site::ReaperScans, "4099-omniscient-reader"),
            "https://reaperscans.com/comics/4099-omniscient-reader"
        );
    }

    #[test]
    fn series_details_reads_the_share_url() -> Result<(), ScraperError> {
        let html = r#"<html><body><main><img src="https://media.reaperscans.com/cover.webp" alt="Omniscient Reader">
<h1>Omniscient Reader</h1></main></body></html>"#;
        let mut sched = FakeScheduler::new().respond(200, html);
        let details = series_details(Site::ReaperScans, &mut sched, "4099-omniscient-reader")?;
        assert_eq!(details.title, "Omniscient Reader");
        assert_eq!(details.url, "https://reaperscans.com/comics/4099-omniscient-reader");
        assert_eq!(sched.requests[0].0.url, details.url);
        assert_eq!(sched.requests[0].1, LISTING_RETRIES);
        Ok(())
    }

    #[test]
    fn missing_series_reports_the_stage() {
        let mut sched = FakeScheduler::new().respond(404, "");
        match series_details(Site::LightNovelPub, &mut sched, "gone") {
            Err(ScraperError::ResourceGone { context, .. }) => assert_eq!(context, "series page"),
            other => panic!("expected ResourceGone, got {:?}", other),
        }
    }

    #[test]
    fn home_sections_use_each_sites_landing_page_and_budget() -> Result<(), ScraperError> {
        let lnp = r#"<html><body><div class="ss-custom"><div><div class="pic"><a href="/shadow-slave.html"><img src="https://cdn.example/s.jpg" title="Shadow Slave"></a></div></div></div></body></html>"#;
        let mut sched = FakeScheduler::new().respond(200, lnp);
        let sections = home_sections(Site::LightNovelPub, &mut sched)?;
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].id, "hot");
        assert_eq!(sections[0].items[0].id, "shadow-slave");
        assert_eq!(sched.requests[0].0.url, "https://www.lightnovelpub.com/hot");
        assert_eq!(sched.requests[0].1, PROBE_RETRIES);

        let reaper = r#"<html><body><section><h2>Latest Comics</h2>
<a href="https://reaperscans.com/comics/4099-omniscient-reader"><img src="https://media.reaperscans.com/o.webp" alt="Omniscient Reader"></a></section></body></html>"#;
        let mut sched = FakeScheduler::new().respond(200, reaper);
        let sections = home_sections(Site::ReaperScans, &mut sched)?;
        assert_eq!(sections[0].title, "Latest Comics");
        assert_eq!(sched.requests[0].0.url, "https://reaperscans.com");
        assert_eq!(sched.requests[0].1, LISTING_RETRIES);
        Ok(())
    }

    #[test]
    fn labelled_text_matches_label_case_insensitively() -> Result<(), ScraperError> {
        let doc = Html::parse_document(
            r#"<div class="stats"><span><strong>1.2M</strong><small>Views</small></span><span><strong>Ongoing</strong><small>Status</small></span></div>"#,
        );
        let root = doc.root_element();
        assert_eq!(
            labelled_text(root, ".stats span", "small", "strong", "status")?.as_deref(),
            Some("Ongoing")
        );
        assert_eq!(labelled_text(root, ".stats span", "small", "strong", "author")?, None);
        Ok(())
    }

    #[test]
    fn element_text_collapses_whitespace() -> Result<(), ScraperError> {
        let doc = Html::parse_fragment("<p>  Chapter\n  12 <b>The   Gate</b> </p>");
        let sel = parse_selector("p")?;
        let text = doc.select(&sel).next().map(element_text);
        assert_eq!(text.as_deref(), Some("Chapter 12 The Gate"));
        Ok(())
    }
}
