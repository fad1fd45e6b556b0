// Unit tests for the poll-loop transition logic and cookie conversion

use super::*;
use crate::sink::MemorySink;
use pretty_assertions::assert_eq;

const NOW: u64 = 100_000;

#[test]
fn test_refresh_takes_priority_over_everything() {
    // Even a simultaneous login redirect yields a refresh first
    let step = next_step(true, true, NOW, 0, 0, false);
    assert_eq!(step, PollStep::Refresh);
}

#[test]
fn test_login_redirect_outside_cooldown_retries() {
    let last_retry = NOW - LOGIN_RETRY_COOLDOWN_SECS - 1;
    let step = next_step(false, true, NOW, last_retry, 0, false);
    assert_eq!(step, PollStep::RetryLogin);
}

#[test]
fn test_login_redirect_never_retried_before() {
    // last_login_retry of zero means no retry yet; always retry once
    let step = next_step(false, true, NOW, 0, 0, false);
    assert_eq!(step, PollStep::RetryLogin);
}

#[test]
fn test_second_login_redirect_inside_cooldown_expires() {
    let last_retry = NOW - LOGIN_RETRY_COOLDOWN_SECS;
    let step = next_step(false, true, NOW, last_retry, 0, false);
    assert_eq!(step, PollStep::ExpireLogin);

    let step = next_step(false, true, NOW, NOW - 1, 0, false);
    assert_eq!(step, PollStep::ExpireLogin);
}

#[test]
fn test_no_harvest_yet_interacts() {
    let step = next_step(false, false, NOW, 0, 0, false);
    assert_eq!(step, PollStep::Interact);
}

#[test]
fn test_stale_harvest_interacts() {
    let last_harvest = NOW - STALENESS_SECS - 1;
    let step = next_step(false, false, NOW, 0, last_harvest, true);
    assert_eq!(step, PollStep::Interact);
}

#[test]
fn test_fresh_harvest_idles() {
    let step = next_step(false, false, NOW, 0, NOW - 1, true);
    assert_eq!(step, PollStep::Idle);

    // Exactly at the staleness bound is still fresh
    let step = next_step(false, false, NOW, 0, NOW - STALENESS_SECS, true);
    assert_eq!(step, PollStep::Idle);
}

#[test]
fn test_cookie_params_carry_all_fields() {
    let records = types::parse_cookies(
        r#"[{
            "name": "SID",
            "value": "abc",
            "domain": ".google.com",
            "path": "/",
            "expires": 1999999999.5,
            "httpOnly": true,
            "secure": true,
            "sameSite": "Strict"
        }]"#,
    )
    .unwrap();

    let params = cookie_params(&records);
    assert_eq!(params.len(), 1);
    let param = &params[0];
    assert_eq!(param.name, "SID");
    assert_eq!(param.value, "abc");
    assert_eq!(param.domain.as_deref(), Some(".google.com"));
    assert_eq!(param.path.as_deref(), Some("/"));
    assert!(param.expires.is_some());
    assert_eq!(param.secure, Some(true));
    assert_eq!(param.http_only, Some(true));
    assert!(matches!(param.same_site, Some(CookieSameSite::Strict)));
}

#[test]
fn test_cookie_params_minimal_record() {
    let records = types::parse_cookies(r#"[{"name": "SID", "value": "abc"}]"#).unwrap();
    let params = cookie_params(&records);
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].name, "SID");
    assert!(params[0].domain.is_none());
    assert!(params[0].same_site.is_none());
}

#[test]
fn test_cookie_params_same_site_mapping() {
    let records = types::parse_cookies(
        r#"[
            {"name": "a", "value": "1", "sameSite": "None"},
            {"name": "b", "value": "2", "sameSite": "Lax"},
            {"name": "c", "value": "3", "sameSite": "no_restriction"}
        ]"#,
    )
    .unwrap();

    let params = cookie_params(&records);
    assert!(matches!(params[0].same_site, Some(CookieSameSite::None)));
    assert!(matches!(params[1].same_site, Some(CookieSameSite::Lax)));
    // Unknown labels fall back to Lax rather than being dropped
    assert!(matches!(params[2].same_site, Some(CookieSameSite::Lax)));
}

#[test]
fn test_update_cookies_always_requests_restart() {
    let harvester = Harvester::new(Arc::new(MemorySink::new()), true);

    harvester.update_cookies(r#"[{"name": "SID", "value": "abc"}]"#);
    assert!(harvester.state().restart_requested());
    assert_eq!(
        harvester.state().cookie_payload().as_deref(),
        Some(r#"[{"name": "SID", "value": "abc"}]"#)
    );

    // Validation happens at launch, not here: even garbage schedules a restart
    harvester.state().clear_restart();
    harvester.update_cookies("not json at all");
    assert!(harvester.state().restart_requested());
}

#[test]
fn test_stop_flips_running_off() {
    let harvester = Harvester::new(Arc::new(MemorySink::new()), true);
    assert!(harvester.state().begin_run());
    assert!(harvester.state().is_running());

    harvester.stop();
    assert!(!harvester.state().is_running());

    // A stopped harvester can be started again
    assert!(harvester.state().begin_run());
}
