//! Optional config file loading. Search order: ./ttipage.toml, then
//! $XDG_CONFIG_HOME/ttipage/config.toml (or ~/.config/ttipage/config.toml).

use crate::layout::{Color, FontFamily, LayoutConfig};
use serde::Deserialize;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Delay in seconds between requests.
    pub request_delay_secs: Option<u64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Upper bound on HTTP attempts per request, whatever the call's own budget.
    pub retry_count: Option<u32>,
    /// Delay in seconds before each retry (e.g. [1, 2, 4]). The last value is reused.
    pub retry_backoff_secs: Option<Vec<u64>>,
    /// Text page layout.
    pub reader: ReaderConfig,
}

/// `[reader]` table: how chapter text is laid out into pages.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ReaderConfig {
    /// San Francisco, Times New Roman, or Monospace.
    pub font: Option<String>,
    pub font_size: Option<u16>,
    /// Named color (white, black, sepia, light gray, ...) or #rrggbb.
    pub text_color: Option<String>,
    pub background_color: Option<String>,
    pub image_width: Option<u32>,
    pub horizontal_padding: Option<u32>,
    pub vertical_padding: Option<u32>,
    pub lines_per_page: Option<u32>,
}

impl ReaderConfig {
    /// Overlay the keys present here onto `base`.
    pub fn apply(&self, base: LayoutConfig) -> Result<LayoutConfig, String> {
        let mut config = base;
        if let Some(font) = &self.font {
            config.font_family = FontFamily::from_name(font)
                .ok_or_else(|| format!("Unknown reader font '{}'", font))?;
        }
        if let Some(c) = &self.text_color {
            config.foreground_color =
                Color::parse(c).ok_or_else(|| format!("Unknown reader text_color '{}'", c))?;
        }
        if let Some(c) = &self.background_color {
            config.background_color = Color::parse(c)
                .ok_or_else(|| format!("Unknown reader background_color '{}'", c))?;
        }
        if let Some(v) = self.font_size {
            config.font_size_pt = v;
        }
        if let Some(v) = self.image_width {
            config.image_width_px = v;
        }
        if let Some(v) = self.horizontal_padding {
            config.horizontal_padding_px = v;
        }
        if let Some(v) = self.vertical_padding {
            config.vertical_padding_px = v;
        }
        if let Some(v) = self.lines_per_page {
            config.lines_per_page = v;
        }
        Ok(config)
    }
}

/// Search order: (1) ./ttipage.toml, (2) $XDG_CONFIG_HOME/ttipage/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("ttipage.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("ttipage").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded config");
            return Ok(Some(config));
        }
    }
    Ok(None)
}
