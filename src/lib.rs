//! ttipage: listing continuation for LightNovelPub and ReaperScans, and a text layout
//! engine that turns chapter prose into fixed-size reader pages.

pub mod cli;
pub mod config;
pub mod layout;
pub mod locator;
pub mod model;
pub mod scraper;
pub mod timeago;

// Re-exports for CLI and consumers.
pub use layout::{LayoutConfig, LayoutError, LayoutResult};
pub use locator::{build_locators, PageLocator};
pub use scraper::{
    resolve_site, Cursor, PoliteClient, PoliteClientBuilder, ResultBatch, Scheduler,
    ScraperError, Site, SiteAdapter,
};
