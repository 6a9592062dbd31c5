//! Text-to-image page layout.
//!
//! Chapter prose is normalized to printable ASCII, greedily word-wrapped against the
//! text width of a fixed-width page image, and grouped into pages of
//! `lines_per_page` lines. Nothing here touches the network or shared state: the same
//! text and [LayoutConfig] always give the same [LayoutResult].

pub mod font_metrics;
pub mod settings;

pub use font_metrics::{FontFamily, FontMetrics};
pub use settings::{Color, LayoutConfig};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("Invalid page locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Could not encode layout settings: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LayoutError {
    pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
        LayoutError::InvalidState {
            reason: reason.into(),
        }
    }
}

/// Line and page totals for one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub total_lines: u32,
    /// `ceil(total_lines / lines_per_page)`, never less than 1.
    pub total_pages: u32,
}

impl LayoutResult {
    fn from_lines(total_lines: u32, lines_per_page: u32) -> Self {
        Self {
            total_lines,
            total_pages: total_lines.div_ceil(lines_per_page).max(1),
        }
    }
}

/// Reduce text to what the page fonts can draw.
///
/// CRLF and CR become `\n`, tabs become spaces, and anything else outside printable
/// ASCII is dropped, not substituted, so accented and CJK text loses glyphs. Blank
/// lines at either end are removed; inner blank lines stay as paragraph breaks.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\n' => out.push('\n'),
            '\t' => out.push(' '),
            ' '..='~' => out.push(c),
            _ => {}
        }
    }
    let lines: Vec<&str> = out.split('\n').collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}

/// Wrap text into lines that each fit the configured text width.
pub fn wrap(text: &str, config: &LayoutConfig) -> Result<Vec<String>, LayoutError> {
    config.validate()?;
    let metrics = FontMetrics::new(config.font_family, config.font_size_pt);
    let budget = u64::from(config.text_width_px()) * 1000;
    let normalized = normalize(text);
    let mut lines = Vec::new();
    if normalized.is_empty() {
        return Ok(lines);
    }
    for paragraph in normalized.split('\n') {
        wrap_paragraph(paragraph, &metrics, budget, &mut lines);
    }
    Ok(lines)
}

/// Greedy wrap of one paragraph. An empty paragraph yields one blank line; a word wider
/// than the budget is split between glyphs.
fn wrap_paragraph(paragraph: &str, metrics: &FontMetrics, budget: u64, out: &mut Vec<String>) {
    let start = out.len();
    let space = metrics.measure_char(' ');
    let mut line = String::new();
    let mut width = 0u64;

    for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
        let word_width = metrics.measure(word);
        if !line.is_empty() && width + space + word_width <= budget {
            line.push(' ');
            line.push_str(word);
            width += space + word_width;
            continue;
        }
        if !line.is_empty() {
            out.push(std::mem::take(&mut line));
            width = 0;
        }
        if word_width <= budget {
            line.push_str(word);
            width = word_width;
            continue;
        }
        for c in word.chars() {
            let w = metrics.measure_char(c);
            if !line.is_empty() && width + w > budget {
                out.push(std::mem::take(&mut line));
                width = 0;
            }
            line.push(c);
            width += w;
        }
    }

    if !line.is_empty() || out.len() == start {
        out.push(line);
    }
}

/// Count lines and pages for `text` under `config`.
///
/// InvalidState when `lines_per_page` or `image_width_px` is zero, or padding eats
/// the whole width. Empty text still yields one (blank) page.
pub fn layout(text: &str, config: &LayoutConfig) -> Result<LayoutResult, LayoutError> {
    let lines = wrap(text, config)?;
    let total_lines = u32::try_from(lines.len()).unwrap_or(u32::MAX);
    Ok(LayoutResult::from_lines(total_lines, config.lines_per_page))
}

/// Group wrapped lines into pages; always at least one page.
pub fn paginate(lines: &[String], lines_per_page: u32) -> Result<Vec<Vec<String>>, LayoutError> {
    if lines_per_page == 0 {
        return Err(LayoutError::invalid_state("lines per page must be positive"));
    }
    if lines.is_empty() {
        return Ok(vec![Vec::new()]);
    }
    Ok(lines
        .chunks(lines_per_page as usize)
        .map(<[String]>::to_vec)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 100px image, 10px padding, 20pt monospace: 80px of text, 10px per glyph.
    fn narrow() -> LayoutConfig {
        LayoutConfig {
            font_family: FontFamily::Monospace,
            font_size_pt: 20,
            image_width_px: 100,
            horizontal_padding_px: 10,
            lines_per_page: 5,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn words_that_fit_alone_but_not_together_take_two_lines() -> Result<(), LayoutError> {
        let result = layout("hello world", &narrow())?;
        assert_eq!(result.total_lines, 2);
        assert_eq!(result.total_pages, 1);
        assert_eq!(wrap("hello world", &narrow())?, ["hello", "world"]);
        Ok(())
    }

    #[test]
    fn short_words_share_a_line_up_to_exact_fit() -> Result<(), LayoutError> {
        // "ab cd efg" is 9 glyphs = 90px > 80px; "ab cd ef" would be exactly 80px.
        assert_eq!(wrap("ab cd ef", &narrow())?, ["ab cd ef"]);
        assert_eq!(wrap("ab cd efg", &narrow())?, ["ab cd", "efg"]);
        Ok(())
    }

    #[test]
    fn overlong_word_breaks_between_glyphs() -> Result<(), LayoutError> {
        assert_eq!(
            wrap("abcdefghijkl xy", &narrow())?,
            ["abcdefgh", "ijkl xy"]
        );
        Ok(())
    }

    #[test]
    fn paragraph_breaks_and_blank_lines_are_kept() -> Result<(), LayoutError> {
        let lines = wrap("one\n\ntwo\r\nthree", &narrow())?;
        assert_eq!(lines, ["one", "", "two", "three"]);
        Ok(())
    }

    #[test]
    fn empty_text_is_one_page_of_zero_lines() -> Result<(), LayoutError> {
        for text in ["", "   \n\n  ", "\u{4e2d}\u{6587}"] {
            let result = layout(text, &narrow())?;
            assert_eq!(result, LayoutResult { total_lines: 0, total_pages: 1 });
        }
        Ok(())
    }

    #[test]
    fn pages_are_ceiling_of_lines_over_page_size() -> Result<(), LayoutError> {
        let config = narrow();
        let text = (1..=12).map(|i| format!("line{}", i)).collect::<Vec<_>>().join("\n");
        let result = layout(&text, &config)?;
        assert_eq!(result.total_lines, 12);
        assert_eq!(result.total_pages, 3);

        let exact = (1..=10).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        assert_eq!(layout(&exact, &config)?.total_pages, 2);
        Ok(())
    }

    #[test]
    fn page_count_invariant_holds_across_configs() -> Result<(), LayoutError> {
        let text = "It was a bright cold day in April, and the clocks were striking thirteen.\n\
                    Winston Smith, his chin nuzzled into his breast in an effort to escape the vile wind, \
                    slipped quickly through the glass doors of Victory Mansions.";
        for family in FontFamily::ALL {
            for (width, lines_per_page) in [(120, 1), (240, 2), (480, 3), (800, 7)] {
                let config = LayoutConfig {
                    font_family: family,
                    font_size_pt: 16,
                    image_width_px: width,
                    horizontal_padding_px: 10,
                    lines_per_page,
                    ..LayoutConfig::default()
                };
                let result = layout(text, &config)?;
                let expected = result.total_lines.div_ceil(lines_per_page).max(1);
                assert_eq!(result.total_pages, expected);
                assert_eq!(layout(text, &config)?, result, "layout must be deterministic");
            }
        }
        Ok(())
    }

    #[test]
    fn no_wrapped_line_exceeds_text_width() -> Result<(), LayoutError> {
        let config = LayoutConfig {
            image_width_px: 300,
            horizontal_padding_px: 25,
            ..LayoutConfig::default()
        };
        let metrics = FontMetrics::new(config.font_family, config.font_size_pt);
        let text = "Supercalifragilisticexpialidocious words and ordinary ones mingle here, \
                    testing that wrapping respects the width budget every single time.";
        for line in wrap(text, &config)? {
            assert!(metrics.measure(&line) <= u64::from(config.text_width_px()) * 1000);
        }
        Ok(())
    }

    #[test]
    fn non_ascii_is_dropped_not_substituted() {
        assert_eq!(normalize("caf\u{e9} na\u{ef}ve\tok"), "caf nave ok");
        assert_eq!(normalize("\n\n  \nbody\n\n"), "body");
        assert_eq!(normalize("a\u{7}b"), "ab");
    }

    #[test]
    fn invalid_config_is_invalid_state() {
        let zero_lines = LayoutConfig {
            lines_per_page: 0,
            ..narrow()
        };
        assert!(matches!(
            layout("text", &zero_lines),
            Err(LayoutError::InvalidState { .. })
        ));
        let zero_width = LayoutConfig {
            image_width_px: 0,
            ..narrow()
        };
        assert!(matches!(
            layout("text", &zero_width),
            Err(LayoutError::InvalidState { .. })
        ));
    }

    #[test]
    fn paginate_groups_lines_and_keeps_a_blank_page() -> Result<(), LayoutError> {
        let lines: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let pages = paginate(&lines, 2)?;
        assert_eq!(pages, [vec!["a", "b"], vec!["c"]]);
        assert_eq!(paginate(&[], 2)?.len(), 1);
        assert!(paginate(&lines, 0).is_err());
        Ok(())
    }
}
