//! Tokens captured from a component page load: CSRF token, server memo, and fingerprint.

use crate::scraper::error::ScraperError;
use crate::scraper::parse_selector;
use scraper::Html;
use serde_json::Value;

/// Attribute holding the component's initial data blob.
pub const INITIAL_DATA_ATTR: &str = "wire:initial-data";
/// Selector for any element carrying [INITIAL_DATA_ATTR].
pub const ANY_COMPONENT_SELECTOR: &str = r"[wire\:initial-data]";

const CSRF_SELECTOR: &str = "meta[name=csrf-token]";
/// Component name used when the fingerprint carries none.
const MISSING_NAME: &str = "fingerprint.was_none";

/// Session tokens for one continuation sequence. Immutable once captured.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSession {
    csrf_token: String,
    server_memo: Value,
    fingerprint: Value,
}

impl TokenSession {
    pub fn new(csrf_token: impl Into<String>, server_memo: Value, fingerprint: Value) -> Self {
        Self {
            csrf_token: csrf_token.into(),
            server_memo,
            fingerprint,
        }
    }

    /// Capture tokens from a freshly loaded page.
    ///
    /// The CSRF token comes from `<meta name="csrf-token">`; the component blob from the
    /// first element matching `component_selector` that carries `wire:initial-data`.
    /// Either one missing, or a blob that is not a JSON object, is a bootstrap failure.
    /// `serverMemo` and `fingerprint` absent from a present blob default to `""`.
    pub fn from_document(doc: &Html, component_selector: &str) -> Result<Self, ScraperError> {
        let csrf_sel = parse_selector(CSRF_SELECTOR)?;
        let component_sel = parse_selector(component_selector)?;

        let csrf_token = doc
            .select(&csrf_sel)
            .find_map(|e| e.value().attr("content"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ScraperError::ProtocolBootstrap {
                reason: "csrf-token meta tag is missing".to_string(),
            })?;

        let blob = doc
            .select(&component_sel)
            .find_map(|e| e.value().attr(INITIAL_DATA_ATTR))
            .ok_or_else(|| ScraperError::ProtocolBootstrap {
                reason: format!(
                    "no element matching {:?} carries {}",
                    component_selector, INITIAL_DATA_ATTR
                ),
            })?;

        let mut data = match serde_json::from_str::<Value>(blob) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(ScraperError::ProtocolBootstrap {
                    reason: "component initial data is not a JSON object".to_string(),
                })
            }
            Err(e) => {
                return Err(ScraperError::ProtocolBootstrap {
                    reason: format!("component initial data is not valid JSON: {}", e),
                })
            }
        };
        let server_memo = data
            .remove("serverMemo")
            .unwrap_or_else(|| Value::String(String::new()));
        let fingerprint = data
            .remove("fingerprint")
            .unwrap_or_else(|| Value::String(String::new()));

        tracing::debug!(
            component = fingerprint.get("name").and_then(serde_json::Value::as_str).unwrap_or(MISSING_NAME),
            "captured component session"
        );
        Ok(Self::new(csrf_token, server_memo, fingerprint))
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    pub fn server_memo(&self) -> &Value {
        &self.server_memo
    }

    pub fn fingerprint(&self) -> &Value {
        &self.fingerprint
    }

    /// `fingerprint.name`, or a fixed placeholder when absent.
    pub fn component_name(&self) -> &str {
        self.fingerprint
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(MISSING_NAME)
    }
}
