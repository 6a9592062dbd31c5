//! LightNovelPub adapter. Listings and chapter lists are plain page-numbered URLs;
//! search is a token-guarded form POST; chapters are prose laid out into text pages.
//! The `/hot` ranking doubles as the home page.

use crate::layout::{self, LayoutConfig};
use crate::locator::build_locators;
use crate::model::{chapter_number, ChapterDetails, ChapterEntry, HomeSection, SeriesDetails, Tile};
use crate::scraper::{
    element_text, first_text, image_src, labelled_text, parse_selector, share_url, Request,
    ResultBatch, Scheduler, ScraperError, Site, SiteAdapter, LISTING_RETRIES,
};
use crate::timeago::parse_time_ago;
use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Deserialize;

pub const BASE_URL: &str = "https://www.lightnovelpub.com";

const SITE: &str = "lightnovelpub";
const TEXT_SELECTOR: &str = "#chapter-container > p";
const TOKEN_SELECTOR: &str = "#novelSearchForm input[name=__LNRequestVerifyToken]";
const HOME_SECTION: &str = "hot";

/// Ranked series listing, `/<section>/<page>/`.
#[derive(Debug, Clone)]
pub struct SectionListing {
    section: String,
}

impl SectionListing {
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into().trim_matches('/').to_string(),
        }
    }
}

impl SiteAdapter for SectionListing {
    type Item = Tile;

    fn name(&self) -> &'static str {
        SITE
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn build_listing_request(&self, page: u32) -> Request {
        Request::get(format!("{}/{}/{}/", BASE_URL, self.section, page))
    }

    fn extract_items(&self, doc: &Html) -> Result<Vec<Tile>, ScraperError> {
        let item_sel = parse_selector("div.ss-custom > div")?;
        let link_sel = parse_selector("div.pic > a")?;
        let img_sel = parse_selector("img")?;
        let mut tiles = Vec::new();
        for item in doc.select(&item_sel) {
            let Some(link) = item.select(&link_sel).next() else {
                continue;
            };
            let href = link.value().attr("href").unwrap_or_default();
            let id = href
                .trim_start_matches('/')
                .split('.')
                .next()
                .unwrap_or_default()
                .to_string();
            if id.is_empty() {
                tracing::warn!(site = SITE, href, "skipping listing item without id");
                continue;
            }
            let img = link.select(&img_sel).next();
            let title = img
                .and_then(|i| i.value().attr("title"))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| id.clone());
            tiles.push(Tile {
                id,
                title,
                image: img.and_then(image_src),
            });
        }
        Ok(tiles)
    }

    /// The pager's last link names the final page.
    fn is_last_page(&self, doc: &Html, page: u32) -> bool {
        let Ok(sel) = parse_selector("div.pages > ul > li > a") else {
            return false;
        };
        doc.select(&sel)
            .last()
            .and_then(|a| element_text(a).parse::<u32>().ok())
            == Some(page)
    }
}

/// A novel's chapter list, `/novel/<id>/chapters/page-<n>`.
#[derive(Debug, Clone)]
pub struct ChapterListing {
    series_id: String,
    now: DateTime<Utc>,
}

impl ChapterListing {
    pub fn new(series_id: impl Into<String>) -> Self {
        Self::at(series_id, Utc::now())
    }

    /// Resolve relative dates against `now` instead of the wall clock.
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

    fn build_listing_request(&self, page: u32) -> Request {
        Request::get(format!(
            "{}/novel/{}/chapters/page-{}",
            BASE_URL, self.series_id, page
        ))
    }

    fn extract_items(&self, doc: &Html) -> Result<Vec<ChapterEntry>, ScraperError> {
        let link_sel = parse_selector("ul.chapter-list > li > a")?;
        let no_sel = parse_selector(".chapter-no")?;
        let title_sel = parse_selector(".chapter-title")?;
        let time_sel = parse_selector(".chapter-update")?;
        let mut chapters = Vec::new();
        for link in doc.select(&link_sel) {
            let href = link.value().attr("href").unwrap_or_default();
            let Some(id) = href
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
            else {
                tracing::warn!(site = SITE, "skipping chapter without link");
                continue;
            };
            let name = link
                .select(&title_sel)
                .next()
                .map(element_text)
                .or_else(|| link.value().attr("title").map(str::to_string))
                .unwrap_or_else(|| id.to_string());
            let number = link
                .select(&no_sel)
                .next()
                .map(|e| chapter_number(&element_text(e)))
                .unwrap_or_else(|| chapter_number(id));
            let published = link
                .select(&time_sel)
                .next()
                .and_then(|e| parse_time_ago(&element_text(e), self.now));
            chapters.push(ChapterEntry {
                id: id.to_string(),
                name,
                number,
                published,
            });
        }
        Ok(chapters)
    }

    /// No "next" link in the pager means this is the last page.
    fn is_last_page(&self, doc: &Html, _page: u32) -> bool {
        parse_selector("ul.pagination li.PagedList-skipToNext a")
            .map(|sel| doc.select(&sel).next().is_none())
            .unwrap_or(false)
    }
}

/// The home page is the first page of the hot ranking, continued by `listing --section hot`.
pub fn extract_home_sections(doc: &Html) -> Result<Vec<HomeSection>, ScraperError> {
    let items = SectionListing::new(HOME_SECTION).extract_items(doc)?;
    if items.is_empty() {
        tracing::warn!(site = SITE, "home page has no ranked novels");
        return Ok(Vec::new());
    }
    let title = first_text(doc.root_element(), "h1")?.unwrap_or_else(|| "Hot Novels".to_string());
    Ok(vec![HomeSection {
        id: HOME_SECTION.to_string(),
        title,
        items,
        view_more: true,
    }])
}

/// Novel metadata from `/novel/<id>`.
pub fn extract_series_details(doc: &Html, series_id: &str) -> Result<SeriesDetails, ScraperError> {
    let root = doc.root_element();
    let title = first_text(root, ".novel-info h1.novel-title")?
        .or(first_text(root, "h1")?)
        .ok_or_else(|| ScraperError::ParsePage {
            message: format!("novel {} has no title", series_id),
        })?;
    let cover_sel = parse_selector(".fixed-img figure.cover img, figure.cover img")?;
    let summary_sel = parse_selector(".summary .content p")?;
    let genre_sel = parse_selector(".categories ul li a")?;
    let paragraphs: Vec<String> = doc
        .select(&summary_sel)
        .map(element_text)
        .filter(|p| !p.is_empty())
        .collect();
    Ok(SeriesDetails {
        id: series_id.to_string(),
        title,
        url: share_url(Site::LightNovelPub, series_id),
        image: doc.select(&cover_sel).find_map(image_src),
        author: first_text(root, ".novel-info .author a")?,
        status: labelled_text(root, ".header-stats span", "small", "strong", "status")?,
        description: (!paragraphs.is_empty()).then(|| paragraphs.join("\n")),
        genres: doc
            .select(&genre_sel)
            .map(element_text)
            .filter(|g| !g.is_empty())
            .collect(),
    })
}

#[derive(Deserialize)]
struct SearchResponse {
    resultview: Option<String>,
}

/// Search results markup returned by `/lnsearchlive`.
pub fn extract_search_results(doc: &Html) -> Result<Vec<Tile>, ScraperError> {
    let item_sel = parse_selector(".novel-item a[href]")?;
    let img_sel = parse_selector("img")?;
    let mut tiles = Vec::new();
    for link in doc.select(&item_sel) {
        let href = link.value().attr("href").unwrap_or_default();
        let Some(id) = href
            .trim_matches('/')
            .strip_prefix("novel/")
            .map(|s| s.split('/').next().unwrap_or(s))
            .filter(|s| !s.is_empty())
        else {
            continue;
        };
        let title = link
            .value()
            .attr("title")
            .map(str::to_string)
            .unwrap_or_else(|| element_text(link));
        tiles.push(Tile {
            id: id.to_string(),
            title,
            image: link.select(&img_sel).next().and_then(image_src),
        });
    }
    Ok(tiles)
}

/// Form value for `inputContent`: percent-encoded, spaces as `+`.
fn encode_query(query: &str) -> String {
    query
        .split(' ')
        .map(|w| urlencoding::encode(w).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

/// Title search. Loads `/search` for its verification token, then posts the query to
/// the live-search endpoint. A body that is not the expected JSON is an anti-bot page.
pub fn search<S: Scheduler + ?Sized>(
    scheduler: &mut S,
    query: &str,
) -> Result<ResultBatch<Tile>, ScraperError> {
    let search_page = format!("{}/search", BASE_URL);
    let body = scheduler
        .schedule(&Request::get(search_page.as_str()), LISTING_RETRIES)?
        .into_checked_body("search page")?;
    let token = {
        let doc = Html::parse_document(&body);
        let sel = parse_selector(TOKEN_SELECTOR)?;
        doc.select(&sel)
            .find_map(|e| e.value().attr("value"))
            .map(str::to_string)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ScraperError::ProtocolBootstrap {
                reason: "search verification token is missing".to_string(),
            })?
    };

    let request = Request::post(
        format!("{}/lnsearchlive", BASE_URL),
        format!("inputContent={}", encode_query(query)),
    )
    .header("X-Requested-With", "XMLHttpRequest")
    .header("LNRequestVerifyToken", token)
    .header(
        "Content-Type",
        "application/x-www-form-urlencoded; charset=UTF-8",
    )
    .header("Referer", search_page);
    tracing::debug!(site = SITE, query, "searching");
    let response = scheduler.schedule(&request, LISTING_RETRIES)?;
    let (status, url) = (response.status, response.url.clone());
    let body = response.into_checked_body("search")?;
    let view = serde_json::from_str::<SearchResponse>(&body)
        .map_err(|_| ScraperError::UpstreamBlocked {
            status,
            url: url.clone(),
            context: "search".to_string(),
        })?
        .resultview
        .ok_or_else(|| ScraperError::ProtocolResponse {
            stage: "Search",
            url,
            reason: "resultview is missing".to_string(),
        })?;
    let tiles = extract_search_results(&Html::parse_fragment(&view))?;
    Ok(ResultBatch::exhausted(tiles))
}

/// Chapter prose: every paragraph of the chapter container, one per line.
pub fn extract_chapter_text(doc: &Html) -> Result<String, ScraperError> {
    let sel = parse_selector(TEXT_SELECTOR)?;
    Ok(doc
        .select(&sel)
        .map(|p| p.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Fetch a chapter, lay its text out under `config`, and return one locator per page.
pub fn chapter_details<S: Scheduler + ?Sized>(
    scheduler: &mut S,
    series_id: &str,
    chapter_id: &str,
    config: &LayoutConfig,
) -> Result<ChapterDetails, ScraperError> {
    config.validate()?;
    let chapter_url = format!("{}/novel/{}/{}", BASE_URL, series_id, chapter_id);
    let body = scheduler
        .schedule(&Request::get(chapter_url.as_str()), LISTING_RETRIES)?
        .into_checked_body("chapter")?;
    let text = extract_chapter_text(&Html::parse_document(&body))?;
    if text.trim().is_empty() {
        tracing::warn!(site = SITE, chapter = chapter_id, "chapter has no text");
    }
    let result = layout::layout(&text, config)?;
    tracing::debug!(
        chapter = chapter_id,
        lines = result.total_lines,
        pages = result.total_pages,
        "laid out chapter"
    );
    let pages = build_locators(&chapter_url, &result, config)?
        .into_iter()
        .map(|l| l.into_string())
        .collect();
    Ok(ChapterDetails {
        id: chapter_id.to_string(),
        manga_id: series_id.to_string(),
        pages,
    })
}
