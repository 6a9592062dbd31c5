//! Static advance-width tables for the reader fonts.
//!
//! Widths are integer thousandths of an em, covering printable ASCII 0x20..=0x7E
//! (index = `char as usize - 32`). A string's width in millipixels is the sum of its
//! advances times the font size; one point renders as one pixel on the page image.
//! Integer arithmetic keeps every measurement exact and reproducible.

use serde::{Deserialize, Serialize};

/// Reader font families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    /// Neo-grotesque sans (Helvetica advances).
    SanFrancisco,
    /// Transitional serif (Times advances).
    TimesNewRoman,
    /// Uniform half-em advance for every glyph.
    Monospace,
}

impl FontFamily {
    pub const ALL: [FontFamily; 3] = [
        FontFamily::SanFrancisco,
        FontFamily::TimesNewRoman,
        FontFamily::Monospace,
    ];

    /// Display name as shown in reader settings.
    pub fn display_name(&self) -> &'static str {
        match self {
            FontFamily::SanFrancisco => "San Francisco",
            FontFamily::TimesNewRoman => "Times New Roman",
            FontFamily::Monospace => "Monospace",
        }
    }

    /// Look up a family by name, ignoring case, spaces, dashes and underscores.
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "sanfrancisco" | "sf" | "sans" => Some(FontFamily::SanFrancisco),
            "timesnewroman" | "times" | "serif" => Some(FontFamily::TimesNewRoman),
            "monospace" | "mono" => Some(FontFamily::Monospace),
            _ => None,
        }
    }

    fn advances(&self) -> &'static [u16; 95] {
        match self {
            FontFamily::SanFrancisco => &SANS_ADVANCES,
            FontFamily::TimesNewRoman => &SERIF_ADVANCES,
            FontFamily::Monospace => &MONO_ADVANCES,
        }
    }
}

/// Metrics for one `(family, size)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    family: FontFamily,
    size_pt: u16,
}

impl FontMetrics {
    pub fn new(family: FontFamily, size_pt: u16) -> Self {
        Self { family, size_pt }
    }

    pub fn family(&self) -> FontFamily {
        self.family
    }

    pub fn size_pt(&self) -> u16 {
        self.size_pt
    }

    /// Advance of one glyph in thousandths of an em. Characters outside printable ASCII
    /// measure as the space; normalized text never contains them.
    pub fn advance_units(&self, c: char) -> u32 {
        let table = self.family.advances();
        let code = c as usize;
        if (32..=126).contains(&code) {
            u32::from(table[code - 32])
        } else {
            u32::from(table[0])
        }
    }

    /// Width of one glyph in millipixels.
    pub fn measure_char(&self, c: char) -> u64 {
        u64::from(self.advance_units(c)) * u64::from(self.size_pt)
    }

    /// Width of a string in millipixels.
    pub fn measure(&self, s: &str) -> u64 {
        s.chars().map(|c| self.measure_char(c)).sum()
    }
}

static SANS_ADVANCES: [u16; 95] = [
    // sp  !    "    #    $    %    &    '    (    )    *    +    ,    -    .    /
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    // 0-9
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    // :   ;    <    =    >    ?    @
    278, 278, 584, 584, 584, 556, 1015,
    // A-M
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    // N-Z
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    // [   \    ]    ^    _    `
    278, 278, 278, 469, 556, 333,
    // a-m
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    // n-z
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    // {   |    }    ~
    334, 260, 334, 584,
];

static SERIF_ADVANCES: [u16; 95] = [
    // sp  !    "    #    $    %    &    '    (    )    *    +    ,    -    .    /
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    // 0-9
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    // :   ;    <    =    >    ?    @
    278, 278, 564, 564, 564, 444, 921,
    // A-M
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889,
    // N-Z
    722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
    // [   \    ]    ^    _    `
    333, 278, 333, 469, 500, 333,
    // a-m
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778,
    // n-z
    500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
    // {   |    }    ~
    480, 200, 480, 541,
];

static MONO_ADVANCES: [u16; 95] = [500; 95];
