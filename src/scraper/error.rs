//! Shared error type for scheduling, listing continuation, and the component protocol.

use crate::layout::LayoutError;
use thiserror::Error;

/// Coarse classification of a [ScraperError], for deciding what to tell the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Try again later (network trouble that outlived the retry budget).
    Transient,
    /// An anti-bot challenge; the user must open the site and clear it.
    Blocked,
    /// The content or the site layout is no longer where we expect it.
    Gone,
    /// The page no longer carries what the adapter extracts; needs a code update.
    SiteChanged,
    /// Caller misuse.
    Misuse,
    Other,
}

/// Shared scraper error for site detection, HTTP, parsing, and protocol failures.
#[derive(Debug, Error)]
pub enum ScraperError {
    // Site / URL
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error(
        "Could not detect site from URL host '{host}'. Use --site lightnovelpub or --site reaperscans."
    )]
    UnrecognizedHost { host: String },

    // HTTP and network
    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} during {context}: {url}")]
    HttpStatus {
        status: u16,
        url: String,
        /// Which stage failed (e.g. "listing page", "search").
        context: String,
    },

    #[error("HTTP {status} during {context} at {url}: blocked by an anti-bot challenge. Open the site in a browser to pass the check (or refresh its cookies), then try again.")]
    UpstreamBlocked {
        status: u16,
        url: String,
        context: String,
    },

    #[error("HTTP 404 during {context} at {url}: the page is gone or the site changed its layout or domain.")]
    ResourceGone { url: String, context: String },

    #[error("Failed to build request for {url}: {reason}")]
    Request { url: String, reason: String },

    #[error("Failed to read response body: {source}")]
    BodyRead { source: reqwest::Error },

    // Parsing
    #[error("Could not parse page: {message}")]
    ParsePage { message: String },

    // Component protocol
    #[error("Could not start a session: {reason}. The site format has probably changed.")]
    ProtocolBootstrap { reason: String },

    #[error("{stage} request to {url} returned no data: {reason}. The site format has probably changed.")]
    ProtocolResponse {
        stage: &'static str,
        url: String,
        reason: String,
    },

    // Misuse
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl ScraperError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ScraperError::Network { .. } | ScraperError::BodyRead { .. } => ErrorClass::Transient,
            ScraperError::HttpStatus { status, .. } if *status >= 500 || *status == 429 => {
                ErrorClass::Transient
            }
            ScraperError::UpstreamBlocked { .. } => ErrorClass::Blocked,
            ScraperError::ResourceGone { .. } => ErrorClass::Gone,
            ScraperError::ParsePage { .. }
            | ScraperError::ProtocolBootstrap { .. }
            | ScraperError::ProtocolResponse { .. } => ErrorClass::SiteChanged,
            ScraperError::InvalidState { .. }
            | ScraperError::InvalidUrl { .. }
            | ScraperError::UnrecognizedHost { .. }
            | ScraperError::Request { .. }
            | ScraperError::Layout(_) => ErrorClass::Misuse,
            ScraperError::HttpStatus { .. } => ErrorClass::Other,
        }
    }

    pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
        ScraperError::InvalidState {
            reason: reason.into(),
        }
    }
}
