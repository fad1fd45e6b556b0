use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A captured API request template: everything the console's front end sent
/// for one generation call, verbatim.
///
/// Built exactly once per matching request and handed to the credential sink
/// immediately; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedArtifact {
    /// Full request URL, query string included
    pub url: String,
    /// HTTP method (always POST for the harvest target)
    pub method: String,
    /// Request headers as sent, including the browser-derived security token
    pub headers: HashMap<String, String>,
    /// Opaque request body (the generation payload)
    pub body: String,
    /// When the request was observed on the wire
    pub captured_at: DateTime<Utc>,
}

/// One browser cookie record as exported by DevTools or Playwright.
///
/// Only `name` and `value` are required; everything else is forwarded to the
/// browser when present. Cookie sets are replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Expiry as seconds since the Unix epoch; session cookie if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    /// "Strict", "Lax" or "None"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

/// Parse a serialized cookie collection (a JSON array of cookie records).
///
/// Callers decide what a failure means: the cookie-update entry point never
/// validates synchronously, so this only runs at session launch.
pub fn parse_cookies(json: &str) -> Result<Vec<CookieRecord>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
