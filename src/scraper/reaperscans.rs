//! ReaperScans adapter. Chapter lists and search run through the site's reactive
//! component; the latest-comics listing is page-numbered; chapters are image pages.
//! The landing page carries the home sections.

use crate::model::{chapter_number, ChapterDetails, ChapterEntry, HomeSection, SeriesDetails, Tile};
use crate::scraper::{
    element_text, first_text, image_src, labelled_text, parse_selector, share_url, Request,
    Scheduler, ScraperError, Site, SiteAdapter, TokenSession, LISTING_RETRIES,
};
use crate::timeago::parse_time_ago;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use std::collections::HashSet;

pub const BASE_URL: &str = "https://reaperscans.com";

const SITE: &str = "reaperscans";
/// The chapter list component sits inside the series page's bottom panel.
const CHAPTER_COMPONENT_SELECTOR: &str = "div.pb-4 div";

/// Path segment following `/comics/` in `href`.
fn comic_id(href: &str) -> Option<&str> {
    let (_, rest) = href.split_once("/comics/")?;
    rest.split(['/', '?', '#']).next().filter(|s| !s.is_empty())
}

/// Comic tiles: links into `/comics/<id>` that carry a cover image, first one per id.
pub fn extract_tiles(doc: &Html) -> Result<Vec<Tile>, ScraperError> {
    tiles_in(doc.root_element())
}

fn tiles_in(root: ElementRef<'_>) -> Result<Vec<Tile>, ScraperError> {
    let link_sel = parse_selector(r#"a[href*="/comics/"]"#)?;
    let img_sel = parse_selector("img")?;
    let mut seen = HashSet::new();
    let mut tiles = Vec::new();
    for link in root.select(&link_sel) {
        let href = link.value().attr("href").unwrap_or_default();
        if href.contains("/chapters/") {
            continue;
        }
        let (Some(id), Some(img)) = (comic_id(href), link.select(&img_sel).next()) else {
            continue;
        };
        if !seen.insert(id.to_string()) {
            continue;
        }
        let title = img
            .value()
            .attr("alt")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                let text = element_text(link);
                if text.is_empty() {
                    id.to_string()
                } else {
                    text
                }
            });
        tiles.push(Tile {
            id: id.to_string(),
            title,
            image: image_src(img),
        });
    }
    Ok(tiles)
}

/// `latest-comics` from "Latest Comics".
fn section_id(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Headed `<section>`s of the landing page that hold comic tiles. A page without such
/// sections yields its tiles as one latest section.
pub fn extract_home_sections(doc: &Html) -> Result<Vec<HomeSection>, ScraperError> {
    let section_sel = parse_selector("section")?;
    let mut sections = Vec::new();
    for section in doc.select(&section_sel) {
        let Some(title) = first_text(section, "h1, h2, h3")? else {
            continue;
        };
        let items = tiles_in(section)?;
        if items.is_empty() {
            continue;
        }
        sections.push(HomeSection {
            id: section_id(&title),
            view_more: title.to_lowercase().contains("latest"),
            title,
            items,
        });
    }
    if sections.is_empty() {
        let items = extract_tiles(doc)?;
        if !items.is_empty() {
            sections.push(HomeSection {
                id: "latest".to_string(),
                title: "Latest Comics".to_string(),
                items,
                view_more: true,
            });
        }
    }
    Ok(sections)
}

/// Comic metadata from `/comics/<id>`: the heading, the first cover image, the blurb, and
/// the `<dt>`/`<dd>` facts table.
pub fn extract_series_details(doc: &Html, series_id: &str) -> Result<SeriesDetails, ScraperError> {
    let root = doc.root_element();
    let title = first_text(root, "h1")?.ok_or_else(|| ScraperError::ParsePage {
        message: format!("comic {} has no title", series_id),
    })?;
    let cover_sel = parse_selector("main img")?;
    Ok(SeriesDetails {
        id: series_id.to_string(),
        title,
        url: share_url(Site::ReaperScans, series_id),
        image: doc.select(&cover_sel).find_map(image_src),
        author: labelled_text(root, "dl > div", "dt", "dd", "author")?,
        status: labelled_text(root, "dl > div", "dt", "dd", "status")?,
        description: first_text(root, ".prose")?,
        genres: Vec::new(),
    })
}

/// `/latest/comics?page=<n>`. The site shows no page count; an empty page ends it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestListing;

impl SiteAdapter for LatestListing {
    type Item = Tile;

    fn name(&self) -> &'static str {
        SITE
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn build_listing_request(&self, page: u32) -> Request {
        Request::get(format!("{}/latest/comics?page={}", BASE_URL, page))
    }

    fn extract_items(&self, doc: &Html) -> Result<Vec<Tile>, ScraperError> {
        extract_tiles(doc)
    }
}

/// The landing page, whose header search box is the first component on the page and is
/// bound to `query`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchListing;

impl SiteAdapter for SearchListing {
    type Item = Tile;

    fn name(&self) -> &'static str {
        SITE
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn build_listing_request(&self, _page: u32) -> Request {
        Request::get(BASE_URL)
    }

    fn extract_items(&self, doc: &Html) -> Result<Vec<Tile>, ScraperError> {
        extract_tiles(doc)
    }
}

/// A series' chapter list: page 1 is rendered into `/comics/<id>`, later pages come
/// from `gotoPage` updates to its component.
#[derive(Debug, Clone)]
pub struct ChapterListing {
    series_id: String,
    now: DateTime<Utc>,
}

impl ChapterListing {
    pub fn new(series_id: impl Into<String>) -> Self {
        Self::at(series_id, Utc::now())
    }

    pub fn at(series_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            series_id: series_id.into(),
            now,
        }
    }
}

impl SiteAdapter for ChapterListing {
    type Item = ChapterEntry;

    fn name(&self) -> &'static str {
        SITE
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn build_listing_request(&self, _page: u32) -> Request {
        Request::get(format!("{}/comics/{}", BASE_URL, self.series_id))
    }

    fn extract_items(&self, doc: &Html) -> Result<Vec<ChapterEntry>, ScraperError> {
        let link_sel = parse_selector(r#"li a[href*="/chapters/"]"#)?;
        let p_sel = parse_selector("p")?;
        let mut chapters = Vec::new();
        for link in doc.select(&link_sel) {
            let href = link.value().attr("href").unwrap_or_default();
            let Some(id) = href
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
            else {
                continue;
            };
            let texts: Vec<String> = link.select(&p_sel).map(element_text).collect();
            let name = texts
                .first()
                .cloned()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| element_text(link));
            let published = texts
                .iter()
                .skip(1)
                .find_map(|t| parse_time_ago(t, self.now));
            chapters.push(ChapterEntry {
                id: id.to_string(),
                number: chapter_number(&name),
                name,
                published,
            });
        }
        Ok(chapters)
    }

    fn extract_session_tokens(&self, doc: &Html) -> Result<TokenSession, ScraperError> {
        TokenSession::from_document(doc, CHAPTER_COMPONENT_SELECTOR)
    }
}

/// Page image URLs of one chapter, in reading order.
pub fn extract_page_images(doc: &Html) -> Result<Vec<String>, ScraperError> {
    let sel = parse_selector("main img")?;
    Ok(doc.select(&sel).filter_map(image_src).collect())
}

/// Fetch a chapter and list its page images.
pub fn chapter_details<S: Scheduler + ?Sized>(
    scheduler: &mut S,
    series_id: &str,
    chapter_id: &str,
) -> Result<ChapterDetails, ScraperError> {
    let url = format!("{}/comics/{}/chapters/{}", BASE_URL, series_id, chapter_id);
    let body = scheduler
        .schedule(&Request::get(url), LISTING_RETRIES)?
        .into_checked_body("chapter")?;
    let pages = extract_page_images(&Html::parse_document(&body))?;
    if pages.is_empty() {
        return Err(ScraperError::ParsePage {
            message: format!("chapter {} has no page images", chapter_id),
        });
    }
    tracing::debug!(chapter = chapter_id, pages = pages.len(), "chapter images");
    Ok(ChapterDetails {
        id: chapter_id.to_string(),
        manga_id: series_id.to_string(),
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::cursor::{fetch_page, Cursor};
    use crate::scraper::fake::FakeScheduler;
    use crate::scraper::livewire::{collect_all, search};
    use chrono::{Duration, TimeZone};
    use serde_json::{json, Value};

    const SERIES: &str = r#"<html><head><meta name="csrf-token" content="csrf-1"></head><body>
<div class="pb-4"><div wire:id="x1" wire:initial-data='{"fingerprint":{"id":"x1","name":"frontend.comic-chapters-list","path":"comics/4099-omniscient-reader"},"serverMemo":{"children":[],"data":{"page":1},"checksum":"abc"}}'>
<ul role="list">
<li><a href="https://reaperscans.com/comics/4099-omniscient-reader/chapters/98765-chapter-120"><p>Chapter 120</p><p>2 hours ago</p></a></li>
<li><a href="https://reaperscans.com/comics/4099-omniscient-reader/chapters/98700-chapter-119"><p>Chapter 119</p><p>1 week ago</p></a></li>
</ul></div></div></body></html>"#;

    fn chapter_fragment(numbers: &[u32]) -> String {
        let lis: String = numbers
            .iter()
            .map(|n| {
                format!(
                    r#"<li><a href="https://reaperscans.com/comics/4099-omniscient-reader/chapters/{n}-chapter-{n}"><p>Chapter {n}</p><p>3 days ago</p></a></li>"#
                )
            })
            .collect();
        json!({"effects": {"html": format!("<div><ul>{}</ul></div>", lis)}}).to_string()
    }

    #[test]
    fn chapter_list_walks_component_pages() -> Result<(), Box<dyn std::error::Error>> {
        let now = Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap();
        let mut sched = FakeScheduler::new()
            .respond(200, SERIES)
            .respond(200, chapter_fragment(&[118, 117]))
            .respond(200, json!({"effects": {"html": "<div></div>"}}).to_string());
        let adapter = ChapterListing::at("4099-omniscient-reader", now);
        let chapters = collect_all(&adapter, &mut sched)?;

        let numbers: Vec<f32> = chapters.iter().map(|c| c.number).collect();
        assert_eq!(numbers, [120.0, 119.0, 118.0, 117.0]);
        assert_eq!(chapters[0].id, "98765-chapter-120");
        assert_eq!(chapters[0].published, Some(now - Duration::hours(2)));
        assert_eq!(chapters[2].published, Some(now - Duration::days(3)));

        assert_eq!(
            sched.requests[0].0.url,
            "https://reaperscans.com/comics/4099-omniscient-reader"
        );
        let post = &sched.requests[1].0;
        assert_eq!(
            post.url,
            "https://reaperscans.com/livewire/message/frontend.comic-chapters-list"
        );
        assert_eq!(post.header_value("X-CSRF-TOKEN"), Some("csrf-1"));
        let body: Value = serde_json::from_str(post.body.as_deref().unwrap_or_default())?;
        assert_eq!(body["serverMemo"]["checksum"], json!("abc"));
        assert_eq!(body["updates"][0]["payload"]["params"], json!([2, "page"]));
        Ok(())
    }

    #[test]
    fn chapter_component_outside_panel_is_a_bootstrap_failure() {
        let html = SERIES.replace(r#"<div class="pb-4">"#, r#"<div class="pt-4">"#);
        let mut sched = FakeScheduler::new().respond(200, html);
        let adapter = ChapterListing::new("4099-omniscient-reader");
        assert!(matches!(
            collect_all(&adapter, &mut sched),
            Err(ScraperError::ProtocolBootstrap { .. })
        ));
        assert_eq!(sched.posts(), 0);
    }

    const TILE: &str = r#"<a href="https://reaperscans.com/comics/{id}"><img src="https://media.reaperscans.com/{id}.webp" alt="Title {id}"></a><a href="https://reaperscans.com/comics/{id}">Title {id}</a>"#;

    fn tiles(ids: &[&str]) -> String {
        ids.iter().map(|id| TILE.replace("{id}", id)).collect()
    }

    #[test]
    fn latest_listing_dedupes_tiles_and_ends_on_empty_page() -> Result<(), ScraperError> {
        let mut sched = FakeScheduler::new()
            .respond(200, format!("<html><body>{}</body></html>", tiles(&["1-a", "2-b"])))
            .respond(200, "<html><body><p>No results</p></body></html>");
        let first = fetch_page(&LatestListing, &mut sched, Cursor::FIRST)?;
        assert_eq!(first.items().len(), 2);
        assert_eq!(first.items()[1].title, "Title 2-b");
        assert_eq!(
            first.items()[1].image.as_deref(),
            Some("https://media.reaperscans.com/2-b.webp")
        );
        assert_eq!(first.next(), Cursor::Page(2));
        let second = fetch_page(&LatestListing, &mut sched, first.next())?;
        assert!(second.is_empty());
        assert_eq!(second.next(), Cursor::Exhausted);
        assert_eq!(
            sched.requests[1].0.url,
            "https://reaperscans.com/latest/comics?page=2"
        );
        Ok(())
    }

    #[test]
    fn search_syncs_lowercased_query() -> Result<(), Box<dyn std::error::Error>> {
        let page = r#"<html><head><meta name="csrf-token" content="c"></head><body>
<div wire:initial-data='{"fingerprint":{"name":"frontend.dtddzhx-ghvjlgrpt"},"serverMemo":{"checksum":"s"}}'></div></body></html>"#;
        let fragment = json!({"effects": {"html": tiles(&["4099-omniscient-reader"])}}).to_string();
        let mut sched = FakeScheduler::new().respond(200, page).respond(200, fragment);
        let batch = search(&SearchListing, &mut sched, "Omniscient")?;
        assert_eq!(batch.items().len(), 1);
        assert_eq!(batch.items()[0].id, "4099-omniscient-reader");
        assert_eq!(batch.next(), Cursor::Exhausted);
        assert_eq!(sched.requests[0].0.url, BASE_URL);
        let body: Value = serde_json::from_str(sched.requests[1].0.body.as_deref().unwrap_or_default())?;
        assert_eq!(body["updates"][0]["type"], json!("syncInput"));
        assert_eq!(body["updates"][0]["payload"]["value"], json!("omniscient"));
        Ok(())
    }

    #[test]
    fn chapter_images_in_order() -> Result<(), ScraperError> {
        let html = r#"<html><body><nav><img src="/logo.png"></nav><main>
<img src="https://media.reaperscans.com/1.jpg"><img data-src="https://media.reaperscans.com/2.jpg" src="data:image/gif;base64,R0lG">
</main></body></html>"#;
        let mut sched = FakeScheduler::new().respond(200, html);
        let details = chapter_details(&mut sched, "4099-omniscient-reader", "98765-chapter-120")?;
        assert_eq!(
            details.pages,
            [
                "https://media.reaperscans.com/1.jpg",
                "https://media.reaperscans.com/2.jpg"
            ]
        );
        assert_eq!(
            sched.requests[0].0.url,
            "https://reaperscans.com/comics/4099-omniscient-reader/chapters/98765-chapter-120"
        );
        Ok(())
    }

    #[test]
    fn chapter_without_images_is_a_parse_error() {
        let mut sched = FakeScheduler::new().respond(200, "<html><main></main></html>");
        let result = chapter_details(&mut sched, "s", "c");
        assert!(matches!(result, Err(ScraperError::ParsePage { .. })));
    }

    #[test]
    fn home_sections_follow_section_headings() -> Result<(), ScraperError> {
        let html = format!(
            r#"<html><body><section><h2>Trending</h2>{}</section><section><h2>Latest Comics</h2>{}</section><section><h2>Discord</h2><p>Join us</p></section></body></html>"#,
            tiles(&["1-a"]),
            tiles(&["2-b", "3-c"])
        );
        let sections = extract_home_sections(&Html::parse_document(&html))?;
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].id, "trending");
        assert!(!sections[0].view_more);
        assert_eq!(sections[1].id, "latest-comics");
        assert!(sections[1].view_more);
        assert_eq!(sections[1].items.len(), 2);
        Ok(())
    }

    #[test]
    fn unsectioned_home_page_is_one_latest_section() -> Result<(), ScraperError> {
        let html = format!("<html><body><div>{}</div></body></html>", tiles(&["1-a", "2-b"]));
        let sections = extract_home_sections(&Html::parse_document(&html))?;
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].id, "latest");
        assert_eq!(sections[0].items.len(), 2);
        assert!(extract_home_sections(&Html::parse_document("<html></html>"))?.is_empty());
        Ok(())
    }

    #[test]
    fn series_details_from_comic_page() -> Result<(), ScraperError> {
        let html = r#"<html><body><main>
<img src="https://media.reaperscans.com/covers/omniscient.webp" alt="Omniscient Reader">
<h1>Omniscient Reader</h1>
<p class="prose">Only I know the end   of this world.</p>
<dl><div><dt>Release Status</dt><dd>Ongoing</dd></div><div><dt>Language</dt><dd>English</dd></div></dl>
</main></body></html>"#;
        let details = extract_series_details(&Html::parse_document(html), "4099-omniscient-reader")?;
        assert_eq!(details.title, "Omniscient Reader");
        assert_eq!(
            details.image.as_deref(),
            Some("https://media.reaperscans.com/covers/omniscient.webp")
        );
        assert_eq!(details.status.as_deref(), Some("Ongoing"));
        assert_eq!(details.author, None);
        assert_eq!(
            details.description.as_deref(),
            Some("Only I know the end of this world.")
        );
        assert_eq!(details.url, "https://reaperscans.com/comics/4099-omniscient-reader");
        Ok(())
    }

    #[test]
    fn comic_ids_from_links() {
        assert_eq!(comic_id("https://reaperscans.com/comics/4099-x"), Some("4099-x"));
        assert_eq!(comic_id("/comics/4099-x/chapters/1"), Some("4099-x"));
        assert_eq!(comic_id("/comics/"), None);
        assert_eq!(comic_id("/latest/comics?page=2"), None);
    }
}
