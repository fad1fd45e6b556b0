//! Response classifier: watches every intercepted response and flags the
//! session for refresh when the harvest endpoint reports an auth or quota
//! failure. Observation only; it never blocks or delays request completion.

use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::HarvestError;
use crate::interceptor::HARVEST_ENDPOINT_MARKER;
use crate::session_state::SessionState;

/// Status codes the provider returns when the session needs a refresh.
///
/// 400 covers a security-token validation failure that the provider reports
/// as a bad request; 401/403 are plain auth loss.
const FAILURE_STATUSES: [i64; 3] = [400, 401, 403];

/// Whether a response signals authentication/authorization/quota failure for
/// the harvested endpoint. Responses for other URLs never match.
pub fn is_auth_failure(url: &str, status: i64) -> bool {
    url.contains(HARVEST_ENDPOINT_MARKER) && FAILURE_STATUSES.contains(&status)
}

/// Record an observed response against the session state.
pub fn observe_response(state: &SessionState, url: &str, status: i64) {
    if is_auth_failure(url, status) {
        warn!(
            "Harvest endpoint returned {}; marking session for refresh",
            status
        );
        state.mark_refresh_needed();
    }
}

/// Subscribe to response events on the page and classify each one.
///
/// Must be registered before navigation: a response can arrive immediately
/// after the first request is issued.
pub(crate) async fn attach(page: &Page, state: Arc<SessionState>) -> Result<JoinHandle<()>> {
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| HarvestError::Cdp(e.to_string()))?;

    Ok(tokio::spawn(async move {
        while let Some(event) = responses.next().await {
            observe_response(&state, &event.response.url, event.response.status);
        }
        debug!("Response classifier stream ended");
    }))
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod classifier_test;
