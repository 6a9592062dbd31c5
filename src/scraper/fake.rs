//! In-memory scheduler for tests: replays canned responses and records every request.

use crate::scraper::client::{Request, Response, Scheduler};
use crate::scraper::error::ScraperError;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct FakeScheduler {
    responses: VecDeque<Response>,
    pub requests: Vec<(Request, u32)>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next scheduled request.
    pub fn respond(mut self, status: u16, body: impl Into<String>) -> Self {
        self.responses.push_back(Response {
            status,
            url: String::new(),
            body: body.into(),
        });
        self
    }

    pub fn posts(&self) -> usize {
        self.requests
            .iter()
            .filter(|(r, _)| r.method == crate::scraper::Method::Post)
            .count()
    }
}

impl Scheduler for FakeScheduler {
    fn schedule(&mut self, request: &Request, retry_count: u32) -> Result<Response, ScraperError> {
        self.requests.push((request.clone(), retry_count));
        let mut response = self
            .responses
            .pop_front()
            .ok_or_else(|| ScraperError::invalid_state("fake scheduler ran out of responses"))?;
        response.url = request.url.clone();
        Ok(response)
    }
}
