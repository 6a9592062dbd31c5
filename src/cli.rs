//! CLI parsing and orchestration. Parses args, runs home sections, listings, series
//! details, chapter lists, search, chapter paging, or an offline layout, and prints JSON.
//! Maps errors to exit codes.

use crate::config::{self, Config};
use crate::layout::{self, Color, FontFamily, LayoutConfig, LayoutError, LayoutResult};
use crate::locator::build_locators;
use crate::scraper::{self, resolve_site, Cursor, PoliteClient, ScraperError, Site};
use clap::{Args as ClapArgs, Parser, Subcommand};
use reqwest::Url;
use serde::Serialize;
use std::cell::RefCell;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Layout(#[from] LayoutError),

    #[error("{0}")]
    Output(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scraper(_) => 2,
            CliRunError::Layout(_) | CliRunError::Output(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ttipage")]
#[command(about = "Browse LightNovelPub and ReaperScans listings and lay chapters out as reader pages")]
#[command(
    after_help = "Config file keys (user_agent, request_delay_secs, timeout_secs, retry_count, retry_backoff_secs, and the [reader] table) are read from ./ttipage.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress progress output (errors only).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging and the full error chain.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// HTTP User-Agent (overrides config).
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Delay between requests in seconds (overrides config; default 1).
    #[arg(long, global = true)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (overrides config; default 10).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the sections of a site's home page.
    Home {
        #[arg(value_parser = parse_site)]
        site: Site,
    },

    /// List series on a site, one page or all of them.
    Listing {
        /// lightnovelpub or reaperscans.
        #[arg(value_parser = parse_site)]
        site: Site,

        /// LightNovelPub ranking section (latest, hot, ...). Default: latest.
        #[arg(long)]
        section: Option<String>,

        /// Fetch only this page (1-based) and print the batch with its next cursor.
        #[arg(long, value_parser = parse_page)]
        page: Option<u32>,
    },

    /// Print a series' title, cover, author, status, and summary.
    Details {
        /// Series URL (or a bare series id with --site).
        url: String,

        /// Override site detection (lightnovelpub or reaperscans).
        #[arg(long, value_parser = parse_site)]
        site: Option<Site>,
    },

    /// List every chapter of a series.
    Chapters {
        /// Series URL (or a bare series id with --site).
        url: String,

        /// Override site detection (lightnovelpub or reaperscans).
        #[arg(long, value_parser = parse_site)]
        site: Option<Site>,
    },

    /// Search a site by title.
    Search {
        #[arg(value_parser = parse_site)]
        site: Site,

        query: String,
    },

    /// Fetch a chapter and print its reader pages (page locators or image URLs).
    Pages {
        /// Chapter URL.
        url: String,

        /// Override site detection (lightnovelpub or reaperscans).
        #[arg(long, value_parser = parse_site)]
        site: Option<Site>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Lay out a local text file (or `-` for stdin) without touching the network.
    Layout {
        input: PathBuf,

        /// Also emit page locators under this chapter URL.
        #[arg(long)]
        chapter_url: Option<String>,

        /// Include the wrapped lines of every page.
        #[arg(long)]
        lines: bool,

        #[command(flatten)]
        layout: LayoutArgs,
    },
}

/// Layout flags; each overrides the config's `[reader]` table.
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct LayoutArgs {
    /// San Francisco, Times New Roman, or Monospace.
    #[arg(long, value_parser = parse_font)]
    pub font: Option<FontFamily>,

    /// Font size in points.
    #[arg(long)]
    pub font_size: Option<u16>,

    /// Text color: a reader color name or #rrggbb.
    #[arg(long, value_parser = parse_color)]
    pub text_color: Option<Color>,

    /// Background color: a reader color name or #rrggbb.
    #[arg(long, value_parser = parse_color)]
    pub background_color: Option<Color>,

    /// Page image width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Horizontal padding in pixels, each side.
    #[arg(long)]
    pub horizontal_padding: Option<u32>,

    /// Vertical padding in pixels, each side.
    #[arg(long)]
    pub vertical_padding: Option<u32>,

    /// Lines per page.
    #[arg(long)]
    pub lines_per_page: Option<u32>,
}

impl LayoutArgs {
    fn apply(&self, base: LayoutConfig) -> LayoutConfig {
        LayoutConfig {
            font_family: self.font.unwrap_or(base.font_family),
            font_size_pt: self.font_size.unwrap_or(base.font_size_pt),
            foreground_color: self.text_color.unwrap_or(base.foreground_color),
            background_color: self.background_color.unwrap_or(base.background_color),
            image_width_px: self.width.unwrap_or(base.image_width_px),
            horizontal_padding_px: self.horizontal_padding.unwrap_or(base.horizontal_padding_px),
            vertical_padding_px: self.vertical_padding.unwrap_or(base.vertical_padding_px),
            lines_per_page: self.lines_per_page.unwrap_or(base.lines_per_page),
        }
    }
}

fn parse_site(s: &str) -> Result<Site, String> {
    match s.to_lowercase().as_str() {
        "lightnovelpub" | "lnp" => Ok(Site::LightNovelPub),
        "reaperscans" | "reaper" => Ok(Site::ReaperScans),
        _ => Err(format!(
            "Invalid site: '{}'. Use 'lightnovelpub' or 'reaperscans'.",
            s
        )),
    }
}

fn parse_page(s: &str) -> Result<u32, String> {
    match s.trim().parse::<u32>() {
        Ok(0) => Err("Invalid --page: pages are numbered from 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Invalid --page: '{}' is not a page number", s)),
    }
}

fn parse_font(s: &str) -> Result<FontFamily, String> {
    FontFamily::from_name(s).ok_or_else(|| {
        format!(
            "Invalid --font value: '{}'. Use San Francisco, Times New Roman, or Monospace.",
            s
        )
    })
}

fn parse_color(s: &str) -> Result<Color, String> {
    Color::parse(s).ok_or_else(|| {
        format!(
            "Invalid color: '{}'. Use a reader color name (white, black, sepia, ...) or #rrggbb.",
            s
        )
    })
}

/// Series and chapter ids from a chapter URL. The chapter is the last path segment.
fn chapter_ref(site: Site, url: &str) -> Result<(String, String), CliRunError> {
    let invalid = |reason: &str| {
        CliRunError::InvalidInput(format!("Expected a chapter URL, got {}: {}", url, reason))
    };
    let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
    let chapter = parsed
        .path_segments()
        .and_then(|segs| segs.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| invalid("no path"))?;
    let series = scraper::series_id(site, url).map_err(|e| invalid(&e.to_string()))?;
    if series == chapter {
        return Err(invalid("this is a series URL"));
    }
    Ok((series, chapter))
}

fn map_site_error(e: ScraperError) -> CliRunError {
    match &e {
        ScraperError::InvalidUrl { input, reason } => CliRunError::InvalidInput(format!(
            "Expected a series or chapter URL. Example: https://www.lightnovelpub.com/novel/shadow-slave ... Invalid: {}: {}",
            input, reason
        )),
        ScraperError::UnrecognizedHost { host } => CliRunError::InvalidInput(format!(
            "Unsupported site: {}. Use --site lightnovelpub or reaperscans to override, or provide a LightNovelPub / ReaperScans URL.",
            host
        )),
        _ => CliRunError::Scraper(e),
    }
}

fn build_client(args: &Args, config: Option<&Config>) -> Result<PoliteClient, CliRunError> {
    let delay_secs = args.delay.or_else(|| config.and_then(|c| c.request_delay_secs));
    let timeout_secs = args.timeout.or_else(|| config.and_then(|c| c.timeout_secs));
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.and_then(|c| c.user_agent.clone()));

    let mut builder = PoliteClient::builder();
    if let Some(secs) = delay_secs {
        builder = builder.delay_secs(secs);
    }
    if let Some(secs) = timeout_secs {
        builder = builder.timeout_secs(secs);
    }
    if let Some(n) = config.and_then(|c| c.retry_count) {
        builder = builder.max_attempts(n);
    }
    if let Some(backoff) = config.and_then(|c| c.retry_backoff_secs.clone()) {
        builder = builder.retry_backoff_secs(backoff);
    }
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))
}

/// Config `[reader]` over defaults, then flags over config.
fn effective_layout(
    flags: &LayoutArgs,
    config: Option<&Config>,
) -> Result<LayoutConfig, CliRunError> {
    let base = match config {
        Some(c) => c
            .reader
            .apply(LayoutConfig::default())
            .map_err(CliRunError::InvalidInput)?,
        None => LayoutConfig::default(),
    };
    let layout = flags.apply(base);
    layout.validate()?;
    Ok(layout)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliRunError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)
        .map_err(|e| CliRunError::Output(format!("Failed to write JSON: {}", e)))?;
    writeln!(out).map_err(|e| CliRunError::Output(format!("Failed to write output: {}", e)))
}

fn read_input(path: &Path) -> Result<String, CliRunError> {
    if path.as_os_str() == "-" {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .map_err(|e| CliRunError::InvalidInput(format!("Cannot read stdin: {}", e)))?;
        return Ok(s);
    }
    std::fs::read_to_string(path)
        .map_err(|e| CliRunError::InvalidInput(format!("Cannot read {}: {}", path.display(), e)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutReport {
    #[serde(flatten)]
    result: LayoutResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    locators: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pages: Option<Vec<Vec<String>>>,
}

fn layout_report(
    text: &str,
    config: &LayoutConfig,
    chapter_url: Option<&str>,
    with_lines: bool,
) -> Result<LayoutReport, LayoutError> {
    let lines = layout::wrap(text, config)?;
    let result = layout::layout(text, config)?;
    let locators = chapter_url
        .map(|url| build_locators(url, &result, config))
        .transpose()?
        .map(|ls| ls.into_iter().map(|l| l.into_string()).collect());
    let pages = if with_lines {
        Some(layout::paginate(&lines, config.lines_per_page)?)
    } else {
        None
    };
    Ok(LayoutReport {
        result,
        locators,
        pages,
    })
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let config = config.as_ref();

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |page: u32, items: usize| {
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new_spinner();
            if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner} {msg} ({elapsed})")
            {
                bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_message(format!("Fetched page {} ({} items)", page, items));
    };
    let progress: Option<&dyn Fn(u32, usize)> = if args.quiet { None } else { Some(&progress_cb) };
    let finish_progress = || {
        if let Some(pb) = progress_state.borrow_mut().take() {
            pb.finish_and_clear();
        }
    };

    match &args.command {
        Command::Home { site } => {
            let mut client = build_client(args, config)?;
            let sections = scraper::home_sections(*site, &mut client)?;
            print_json(&sections)
        }
        Command::Listing {
            site,
            section,
            page,
        } => {
            let mut client = build_client(args, config)?;
            scraper::probe(*site, &mut client)?;
            match page {
                Some(n) => {
                    let batch = scraper::listing_page(
                        *site,
                        &mut client,
                        section.as_deref(),
                        Cursor::Page(*n),
                    )?;
                    print_json(&batch)
                }
                None => {
                    let tiles = scraper::listing(
                        *site,
                        &mut client,
                        section.as_deref(),
                        Cursor::FIRST,
                        progress,
                    );
                    finish_progress();
                    print_json(&tiles?)
                }
            }
        }
        Command::Details { url, site } => {
            let site = resolve_site(url, *site).map_err(map_site_error)?;
            let series = scraper::series_id(site, url).map_err(map_site_error)?;
            let mut client = build_client(args, config)?;
            let details = scraper::series_details(site, &mut client, &series)?;
            print_json(&details)
        }
        Command::Chapters { url, site } => {
            let site = resolve_site(url, *site).map_err(map_site_error)?;
            let series = scraper::series_id(site, url).map_err(map_site_error)?;
            let mut client = build_client(args, config)?;
            let chapters = scraper::all_chapters(site, &mut client, &series, progress);
            finish_progress();
            let chapters = chapters?;
            if !args.quiet {
                eprintln!("Chapters: {}", chapters.len());
            }
            print_json(&chapters)
        }
        Command::Search { site, query } => {
            let mut client = build_client(args, config)?;
            let batch = scraper::search(*site, &mut client, query)?;
            print_json(&batch)
        }
        Command::Pages { url, site, layout } => {
            let site = resolve_site(url, *site).map_err(map_site_error)?;
            let layout_config = effective_layout(layout, config)?;
            let (series, chapter) = chapter_ref(site, url)?;
            let mut client = build_client(args, config)?;
            let details =
                scraper::chapter_details(site, &mut client, &series, &chapter, &layout_config)?;
            print_json(&details)
        }
        Command::Layout {
            input,
            chapter_url,
            lines,
            layout,
        } => {
            let layout_config = effective_layout(layout, config)?;
            let text = read_input(input)?;
            let report = layout_report(&text, &layout_config, chapter_url.as_deref(), *lines)?;
            print_json(&report)
        }
    }
}
