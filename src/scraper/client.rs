//! Request scheduler contract and a blocking implementation with politeness delay and retries.

use crate::scraper::error::ScraperError;
use std::time::{Duration, Instant};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:97.0) Gecko/20100101 Firefox/97.0";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DELAY_SECS: u64 = 1;
const MAX_REDIRECTS: usize = 10;

/// Default backoff delays in seconds after each failed attempt (1s, 2s, 4s, 8s).
const DEFAULT_BACKOFF_SECS: [u64; 4] = [1, 2, 4, 8];
/// Backoff for HTTP 429 (rate limit): wait longer so the server can recover.
const BACKOFF_429_SECS: [u64; 4] = [30, 60, 90, 120];

/// Retry budget for listing pages and component protocol calls.
pub const LISTING_RETRIES: u32 = 5;
/// Retry budget for the first home-page probe.
pub const PROBE_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One HTTP request as handed to a [Scheduler].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of the first header with this name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Final response after the scheduler has spent its retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub url: String,
    pub body: String,
}

impl Response {
    /// Classify the status and hand back the body on success.
    ///
    /// 403 and 503 are anti-bot challenges, 404 means the resource is gone. Every error
    /// carries `context`, the stage that failed.
    pub fn into_checked_body(self, context: &str) -> Result<String, ScraperError> {
        match self.status {
            200..=299 => Ok(self.body),
            403 | 503 => Err(ScraperError::UpstreamBlocked {
                status: self.status,
                url: self.url,
                context: context.to_string(),
            }),
            404 => Err(ScraperError::ResourceGone {
                url: self.url,
                context: context.to_string(),
            }),
            status => Err(ScraperError::HttpStatus {
                status,
                url: self.url,
                context: context.to_string(),
            }),
        }
    }
}

/// Runs requests on behalf of the continuation layer.
///
/// Implementations retry transient failures (timeouts, connection errors, overload
/// statuses) up to `retry_count` attempts in total and then surface the last status
/// and body, or the last network error.
pub trait Scheduler {
    fn schedule(&mut self, request: &Request, retry_count: u32) -> Result<Response, ScraperError>;
}

impl<S: Scheduler + ?Sized> Scheduler for &mut S {
    fn schedule(&mut self, request: &Request, retry_count: u32) -> Result<Response, ScraperError> {
        (**self).schedule(request, retry_count)
    }
}

/// 429 and 5xx, except 503 which is the anti-bot challenge and surfaces immediately.
fn is_retryable_status(status: u16) -> bool {
    status == 429 || ((500..=599).contains(&status) && status != 503)
}

/// Blocking HTTP client that enforces a delay between requests.
#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
    backoff_secs: Vec<u64>,
    max_attempts: Option<u32>,
}

impl PoliteClient {
    /// Build a polite client with default User-Agent, timeout, and delay.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    fn build_request(
        &self,
        request: &Request,
    ) -> Result<reqwest::blocking::RequestBuilder, ScraperError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let url = reqwest::Url::parse(&request.url).map_err(|e| ScraperError::InvalidUrl {
            input: request.url.clone(),
            reason: e.to_string(),
        })?;
        let mut builder = self.inner.request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }

    fn backoff(&self, status: Option<u16>, attempt: u32) -> Duration {
        let table: &[u64] = if status == Some(429) {
            &BACKOFF_429_SECS
        } else {
            &self.backoff_secs
        };
        let secs = table
            .get(attempt as usize)
            .or_else(|| table.last())
            .copied()
            .unwrap_or(1);
        Duration::from_secs(secs)
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

impl Scheduler for PoliteClient {
    fn schedule(&mut self, request: &Request, retry_count: u32) -> Result<Response, ScraperError> {
        let max_attempts = self
            .max_attempts
            .map_or(retry_count, |cap| retry_count.min(cap))
            .max(1);
        let mut attempt = 0;
        loop {
            self.wait_delay();
            let builder = self.build_request(request)?;
            tracing::debug!(method = ?request.method, url = %request.url, attempt, "sending request");
            let result = builder.send();
            self.last_request = Some(Instant::now());
            let last_attempt = attempt + 1 >= max_attempts;
            match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if is_retryable_status(status) && !last_attempt {
                        let wait = self.backoff(Some(status), attempt);
                        tracing::warn!(status, url = %request.url, ?wait, "retryable status, backing off");
                        std::thread::sleep(wait);
                        attempt += 1;
                        continue;
                    }
                    let url = response.url().to_string();
                    let body = response
                        .text()
                        .map_err(|e| ScraperError::BodyRead { source: e })?;
                    return Ok(Response { status, url, body });
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && !last_attempt {
                        let wait = self.backoff(None, attempt);
                        tracing::warn!(url = %request.url, error = %e, ?wait, "network error, backing off");
                        std::thread::sleep(wait);
                        attempt += 1;
                        continue;
                    }
                    return Err(ScraperError::Network {
                        url: request.url.clone(),
                        source: e,
                    });
                }
            }
        }
    }
}

/// Builder for PoliteClient with optional User-Agent, delay, timeout, and backoff settings.
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
    retry_backoff_secs: Vec<u64>,
    max_attempts: Option<u32>,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_secs: DEFAULT_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
            max_attempts: None,
        }
    }
}

impl PoliteClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set delay between requests in seconds. Default 1.
    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Set request timeout in seconds. Default 10.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set backoff delays in seconds before each retry (e.g. [1, 2, 4]). If shorter than the retry budget, the last value is reused.
    pub fn retry_backoff_secs(mut self, secs: Vec<u64>) -> Self {
        self.retry_backoff_secs = secs;
        self
    }

    /// Cap the attempts of every request, whatever budget the caller asks for.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        let backoff_secs = if self.retry_backoff_secs.is_empty() {
            DEFAULT_BACKOFF_SECS.to_vec()
        } else {
            self.retry_backoff_secs
        };
        Ok(PoliteClient {
            inner,
            delay: Duration::from_secs(self.delay_secs),
            last_request: None,
            backoff_secs,
            max_attempts: self.max_attempts,
        })
    }
}
