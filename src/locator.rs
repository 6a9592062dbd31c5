//! Page locators: one stable URL per rendered page of a chapter.
//!
//! Shape: `<chapter url>/?ttiparse&ttipage=<n>&ttisettings=<url-encoded JSON settings>`.
//! The full [LayoutConfig] travels in the locator so a renderer can redo the exact wrap
//! without any state from the engine.

use crate::layout::{LayoutConfig, LayoutError, LayoutResult};
use serde::Serialize;
use std::fmt;

const PARSE_FLAG: &str = "ttiparse";
const PAGE_KEY: &str = "ttipage";
const SETTINGS_KEY: &str = "ttisettings";

/// Opaque locator for one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PageLocator(String);

impl PageLocator {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Recover chapter URL, page index and settings from a locator string.
    pub fn parse(locator: &str) -> Result<DecodedLocator, LayoutError> {
        let invalid = |reason: &str| LayoutError::InvalidLocator {
            locator: locator.to_string(),
            reason: reason.to_string(),
        };
        let (base, query) = locator
            .split_once('?')
            .ok_or_else(|| invalid("no query string"))?;

        let mut flagged = false;
        let mut page_index = None;
        let mut settings = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                None if pair == PARSE_FLAG => flagged = true,
                Some((PAGE_KEY, v)) => page_index = v.parse::<u32>().ok().filter(|n| *n >= 1),
                Some((SETTINGS_KEY, v)) => settings = Some(v),
                _ => {}
            }
        }
        if !flagged {
            return Err(invalid("not a text page locator"));
        }
        let page_index = page_index.ok_or_else(|| invalid("missing or invalid page index"))?;
        let settings = settings.ok_or_else(|| invalid("missing settings"))?;
        let json = urlencoding::decode(settings).map_err(|e| invalid(&e.to_string()))?;
        let config: LayoutConfig =
            serde_json::from_str(&json).map_err(|e| invalid(&e.to_string()))?;
        config.validate()?;

        Ok(DecodedLocator {
            chapter_url: base.trim_end_matches('/').to_string(),
            page_index,
            config,
        })
    }
}

impl fmt::Display for PageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PageLocator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fields recovered by [PageLocator::parse].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLocator {
    pub chapter_url: String,
    pub page_index: u32,
    pub config: LayoutConfig,
}

/// URL-encoded settings payload for `config`.
pub fn encode_settings(config: &LayoutConfig) -> Result<String, LayoutError> {
    let json = serde_json::to_string(config)?;
    Ok(urlencoding::encode(&json).into_owned())
}

/// Locators for pages `1..=layout.total_pages`, in order.
pub fn build_locators(
    chapter_url: &str,
    layout: &LayoutResult,
    config: &LayoutConfig,
) -> Result<Vec<PageLocator>, LayoutError> {
    config.validate()?;
    let base = chapter_url.trim_end_matches('/');
    let settings = encode_settings(config)?;
    Ok((1..=layout.total_pages)
        .map(|page| {
            PageLocator(format!(
                "{}/?{}&{}={}&{}={}",
                base, PARSE_FLAG, PAGE_KEY, page, SETTINGS_KEY, settings
            ))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::FontFamily;
    use std::collections::HashSet;

    const CHAPTER: &str = "https://www.lightnovelpub.com/novel/the-beginning-after-the-end/chapter-1";

    fn result(total_pages: u32) -> LayoutResult {
        LayoutResult {
            total_lines: total_pages * 10,
            total_pages,
        }
    }

    #[test]
    fn one_locator_per_page_in_increasing_order() -> Result<(), LayoutError> {
        let locators = build_locators(CHAPTER, &result(4), &LayoutConfig::default())?;
        assert_eq!(locators.len(), 4);
        for (i, locator) in locators.iter().enumerate() {
            let decoded = PageLocator::parse(locator.as_str())?;
            assert_eq!(decoded.page_index, i as u32 + 1);
            assert_eq!(decoded.chapter_url, CHAPTER);
        }
        Ok(())
    }

    #[test]
    fn url_shape_is_fixed() -> Result<(), LayoutError> {
        let locators = build_locators(
            "https://example.com/novel/x/chapter-2/",
            &result(1),
            &LayoutConfig::default(),
        )?;
        let url = locators[0].as_str();
        assert!(url.starts_with(
            "https://example.com/novel/x/chapter-2/?ttiparse&ttipage=1&ttisettings=%7B%22fontFamily%22"
        ));
        assert!(!url.contains("chapter-2//"));
        Ok(())
    }

    #[test]
    fn locators_are_stable_and_distinct() -> Result<(), LayoutError> {
        let config = LayoutConfig::default();
        let a = build_locators(CHAPTER, &result(3), &config)?;
        let b = build_locators(CHAPTER, &result(3), &config)?;
        assert_eq!(a, b);

        let other = build_locators(&format!("{}0", CHAPTER), &result(3), &config)?;
        let all: HashSet<&PageLocator> = a.iter().chain(other.iter()).collect();
        assert_eq!(all.len(), 6);
        Ok(())
    }

    #[test]
    fn settings_round_trip_through_the_locator() -> Result<(), LayoutError> {
        let config = LayoutConfig {
            font_family: FontFamily::TimesNewRoman,
            font_size_pt: 22,
            lines_per_page: 35,
            ..LayoutConfig::default()
        };
        let locators = build_locators(CHAPTER, &result(2), &config)?;
        assert_eq!(PageLocator::parse(locators[1].as_str())?.config, config);
        Ok(())
    }

    #[test]
    fn empty_chapter_still_gets_a_page() -> Result<(), LayoutError> {
        let single = LayoutResult {
            total_lines: 0,
            total_pages: 1,
        };
        assert_eq!(build_locators(CHAPTER, &single, &LayoutConfig::default())?.len(), 1);
        Ok(())
    }

    #[test]
    fn foreign_urls_do_not_parse() {
        for bad in [
            "https://example.com/chapter-1",
            "https://example.com/chapter-1/?page=2",
            "https://example.com/chapter-1/?ttiparse&ttipage=0&ttisettings=%7B%7D",
            "https://example.com/chapter-1/?ttiparse&ttipage=1&ttisettings=%7B%7D",
        ] {
            assert!(matches!(
                PageLocator::parse(bad),
                Err(LayoutError::InvalidLocator { .. })
            ));
        }
    }
}
