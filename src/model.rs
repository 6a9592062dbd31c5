//! Items produced by the site adapters.
//!
//! Listings and search yield [Tile]s, the home page yields [HomeSection]s, a series page
//! yields [SeriesDetails], chapter lists yield [ChapterEntry]s, and a chapter fetch yields
//! [ChapterDetails] whose pages are page locators (text) or image URLs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One series in a listing or search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Site-relative series id (e.g. `the-beginning-after-the-end`).
    pub id: String,
    pub title: String,
    /// Cover image URL, when the listing shows one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A group of tiles shown on a site's home page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeSection {
    pub id: String,
    pub title: String,
    pub items: Vec<Tile>,
    /// Whether the `listing` command continues this section past the home page.
    pub view_more: bool,
}

/// Metadata from a series' landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDetails {
    pub id: String,
    pub title: String,
    /// Shareable series URL.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// As the site words it ("Ongoing", "Completed", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
}

/// One chapter in a series' chapter list, newest first as the site lists them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterEntry {
    pub id: String,
    pub name: String,
    /// Chapter number parsed from the listing; 0 when it shows none.
    pub number: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
}

/// A chapter ready for the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDetails {
    pub id: String,
    pub manga_id: String,
    /// In reading order.
    pub pages: Vec<String>,
}

/// First number in `text` (`"Chapter 12.5 - Title"` gives 12.5), or 0.
pub fn chapter_number(text: &str) -> f32 {
    let start = match text.find(|c: char| c.is_ascii_digit()) {
        Some(i) => i,
        None => return 0.0,
    };
    let rest = &text[start..];
    let mut end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if rest[end..].starts_with('.')
        && rest[end + 1..].starts_with(|c: char| c.is_ascii_digit())
    {
        end += 1 + rest[end + 1..]
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len() - end - 1);
    }
    rest[..end].parse().unwrap_or(0.0)
}
