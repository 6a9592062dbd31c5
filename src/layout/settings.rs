//! Reader layout settings: font, colors, image geometry, and lines per page.

use crate::layout::font_metrics::FontFamily;
use crate::layout::LayoutError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named reader colors. Lookup ignores case and treats spaces as underscores.
const NAMED_COLORS: &[(&str, Color)] = &[
    ("white", Color::rgb(0xff, 0xff, 0xff)),
    ("black", Color::rgb(0x00, 0x00, 0x00)),
    ("sepia", Color::rgb(0xf4, 0xec, 0xd8)),
    ("cream", Color::rgb(0xff, 0xfd, 0xd0)),
    ("light_gray", Color::rgb(0xd3, 0xd3, 0xd3)),
    ("gray", Color::rgb(0x80, 0x80, 0x80)),
    ("dark_gray", Color::rgb(0x3a, 0x3a, 0x3a)),
    ("night", Color::rgb(0x12, 0x12, 0x12)),
    ("coffee", Color::rgb(0x5b, 0x46, 0x36)),
];

/// RGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a named reader color (`"light gray"`) or `#rrggbb`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            return Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?));
        }
        let key = s.to_lowercase().replace(' ', "_");
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, c)| *c)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Color::parse(&s).ok_or_else(|| format!("unknown color {:?}", s))
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

/// Everything that decides how a chapter wraps and paginates.
///
/// Field order is the serialization order, so the encoded form is stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub font_family: FontFamily,
    pub font_size_pt: u16,
    pub foreground_color: Color,
    pub background_color: Color,
    pub image_width_px: u32,
    pub horizontal_padding_px: u32,
    pub vertical_padding_px: u32,
    pub lines_per_page: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_family: FontFamily::SanFrancisco,
            font_size_pt: 18,
            foreground_color: Color::rgb(0x00, 0x00, 0x00),
            background_color: Color::rgb(0xff, 0xff, 0xff),
            image_width_px: 800,
            horizontal_padding_px: 20,
            vertical_padding_px: 20,
            lines_per_page: 60,
        }
    }
}

impl LayoutConfig {
    /// Reject geometry the engine cannot lay out.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.lines_per_page == 0 {
            return Err(LayoutError::invalid_state("lines per page must be positive"));
        }
        if self.image_width_px == 0 {
            return Err(LayoutError::invalid_state("image width must be positive"));
        }
        if self.font_size_pt == 0 {
            return Err(LayoutError::invalid_state("font size must be positive"));
        }
        if self.text_width_px() == 0 {
            return Err(LayoutError::invalid_state(format!(
                "horizontal padding {}px leaves no room on a {}px image",
                self.horizontal_padding_px, self.image_width_px
            )));
        }
        Ok(())
    }

    /// Width available to text: image width minus padding on both sides.
    pub fn text_width_px(&self) -> u32 {
        self.image_width_px
            .saturating_sub(self.horizontal_padding_px.saturating_mul(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_and_hex_colors_parse() {
        assert_eq!(Color::parse("Light Gray"), Some(Color::rgb(0xd3, 0xd3, 0xd3)));
        assert_eq!(Color::parse("#1A2b3c"), Some(Color::rgb(0x1a, 0x2b, 0x3c)));
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("chartreuse"), None);
        assert_eq!(Color::rgb(0x1a, 0x2b, 0x3c).to_string(), "#1a2b3c");
    }

    #[test]
    fn config_serializes_camel_case_with_hex_colors() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&LayoutConfig::default())?;
        assert_eq!(
            json,
            r##"{"fontFamily":"san_francisco","fontSizePt":18,"foregroundColor":"#000000","backgroundColor":"#ffffff","imageWidthPx":800,"horizontalPaddingPx":20,"verticalPaddingPx":20,"linesPerPage":60}"##
        );
        let back: LayoutConfig = serde_json::from_str(&json)?;
        assert_eq!(back, LayoutConfig::default());
        Ok(())
    }

    #[test]
    fn unknown_color_fails_to_deserialize() {
        let json = r##"{"fontFamily":"monospace","fontSizePt":18,"foregroundColor":"mauve","backgroundColor":"#ffffff","imageWidthPx":800,"horizontalPaddingPx":20,"verticalPaddingPx":20,"linesPerPage":60}"##;
        assert!(serde_json::from_str::<LayoutConfig>(json).is_err());
    }

    #[test]
    fn validation_rejects_degenerate_geometry() {
        let ok = LayoutConfig::default();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.text_width_px(), 760);

        for bad in [
            LayoutConfig { lines_per_page: 0, ..ok.clone() },
            LayoutConfig { image_width_px: 0, ..ok.clone() },
            LayoutConfig { font_size_pt: 0, ..ok.clone() },
            LayoutConfig { horizontal_padding_px: 400, ..ok.clone() },
        ] {
            assert!(matches!(bad.validate(), Err(LayoutError::InvalidState { .. })));
        }
    }
}
