//! Request interceptor: watches outgoing network traffic for the one request
//! type that constitutes a successful harvest and forwards the captured
//! template to the credential sink.
//!
//! Interception is passive (CDP `Network` events): every request proceeds
//! unmodified whether or not it matched, and extraction failures are
//! swallowed rather than disturbing the page.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{self, EventRequestWillBeSent};
use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::HarvestError;
use crate::session_state::{SessionState, now_secs};
use crate::sink::CredentialSink;
use crate::types::HarvestedArtifact;

/// Path segment that distinguishes the harvest endpoint from the rest of the
/// console's traffic.
pub const HARVEST_ENDPOINT_MARKER: &str = "batchGraphql";

/// Body markers for the two generation-call shapes the console issues.
pub const GENERATION_MARKERS: [&str; 2] = ["StreamGenerateContent", "generateContent"];

/// Whether an outgoing request is the harvest target.
pub fn is_harvest_request(url: &str, method: &str, body: Option<&str>) -> bool {
    if method != "POST" || !url.contains(HARVEST_ENDPOINT_MARKER) {
        return false;
    }
    match body {
        Some(body) => GENERATION_MARKERS.iter().any(|m| body.contains(m)),
        None => false,
    }
}

/// Record an observed outgoing request. Returns true if it was harvested.
///
/// On a match this builds the artifact, hands it to the sink, stamps the
/// harvest time, clears the login-retry cooldown (a successful harvest proves
/// the session is authenticated) and fires the sink's completion signal.
/// Every matching request produces its own artifact and its own firing.
pub async fn observe_request(
    state: &SessionState,
    sink: &dyn CredentialSink,
    url: &str,
    method: &str,
    headers: HashMap<String, String>,
    body: Option<&str>,
) -> bool {
    if !is_harvest_request(url, method, body) {
        return false;
    }

    info!("Captured target generation request");
    let artifact = HarvestedArtifact {
        url: url.to_string(),
        method: method.to_string(),
        headers,
        // is_harvest_request only matches when a body is present
        body: body.unwrap_or_default().to_string(),
        captured_at: Utc::now(),
    };

    sink.update(artifact).await;
    state.record_harvest(now_secs());
    state.clear_login_retry();
    sink.signal().set();
    true
}

/// Flatten a CDP header object into a plain string map.
///
/// The console only sends string-valued headers; anything else has no place in
/// a replayable request template and is skipped.
pub(crate) fn headers_to_map(headers: &network::Headers) -> HashMap<String, String> {
    let Ok(serde_json::Value::Object(object)) = serde_json::to_value(headers) else {
        return HashMap::new();
    };
    object
        .into_iter()
        .filter_map(|(name, value)| match value {
            serde_json::Value::String(value) => Some((name, value)),
            _ => None,
        })
        .collect()
}

/// Subscribe to request events on the page and inspect each one.
///
/// Registered before navigation, alongside the response classifier.
pub(crate) async fn attach(
    page: &Page,
    state: Arc<SessionState>,
    sink: Arc<dyn CredentialSink>,
) -> Result<JoinHandle<()>> {
    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| HarvestError::Cdp(e.to_string()))?;

    Ok(tokio::spawn(async move {
        while let Some(event) = requests.next().await {
            let request = &event.request;
            let body = request.post_data_entries.as_ref().map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.bytes.as_ref())
                    .map(AsRef::<str>::as_ref)
                    .collect::<String>()
            });
            observe_request(
                &state,
                sink.as_ref(),
                &request.url,
                &request.method,
                headers_to_map(&request.headers),
                body.as_deref(),
            )
            .await;
        }
        debug!("Request interceptor stream ended");
    }))
}

#[cfg(test)]
#[path = "interceptor_test.rs"]
mod interceptor_test;
