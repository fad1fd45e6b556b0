// Unit tests for the response classifier

use super::*;
use crate::session_state::SessionState;

const ENDPOINT: &str = "https://console.cloud.google.com/api/batchGraphql?rt=b";
const OTHER_URL: &str = "https://console.cloud.google.com/api/listModels";

#[test]
fn test_failure_statuses_match() {
    // 400 covers the token-validation failure reported as a bad request
    assert!(is_auth_failure(ENDPOINT, 400));
    assert!(is_auth_failure(ENDPOINT, 401));
    assert!(is_auth_failure(ENDPOINT, 403));
}

#[test]
fn test_success_and_other_statuses_do_not_match() {
    assert!(!is_auth_failure(ENDPOINT, 200));
    assert!(!is_auth_failure(ENDPOINT, 404));
    assert!(!is_auth_failure(ENDPOINT, 429));
    assert!(!is_auth_failure(ENDPOINT, 500));
}

#[test]
fn test_non_harvest_urls_never_match() {
    assert!(!is_auth_failure(OTHER_URL, 401));
    assert!(!is_auth_failure(OTHER_URL, 403));
    assert!(!is_auth_failure("", 403));
}

#[test]
fn test_observe_response_sets_refresh_flag() {
    let state = SessionState::new(None);
    observe_response(&state, ENDPOINT, 403);
    assert!(state.refresh_needed());
}

#[test]
fn test_observe_response_ignores_success() {
    let state = SessionState::new(None);
    observe_response(&state, ENDPOINT, 200);
    observe_response(&state, OTHER_URL, 403);
    assert!(!state.refresh_needed());
}

#[test]
fn test_repeated_failures_latch_once() {
    // Three consecutive 403s set the flag; one reload clears it once,
    // no matter how many times it was set.
    let state = SessionState::new(None);
    observe_response(&state, ENDPOINT, 403);
    observe_response(&state, ENDPOINT, 403);
    observe_response(&state, ENDPOINT, 403);
    assert!(state.refresh_needed());

    state.clear_refresh();
    assert!(!state.refresh_needed());
}
