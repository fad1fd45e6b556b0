//! Session lifecycle controller: owns the browser, sequences navigation,
//! polling, refresh and restart, and consumes the signals the classifier,
//! interceptor and interaction driver leave in the shared session state.
//!
//! One full cycle runs LAUNCHING -> NAVIGATING -> ACTIVE -> TORN_DOWN and
//! loops back to LAUNCHING unless the harvester is stopped. Any unhandled
//! error inside a cycle is caught at the outermost level; the harvester never
//! lets an error terminate the process while it is running.

use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::network::{
    self, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::classifier;
use crate::dom::PageDom;
use crate::errors::HarvestError;
use crate::interaction::InteractionDriver;
use crate::interceptor;
use crate::session_state::{SessionState, now_secs};
use crate::sink::CredentialSink;
use crate::types::{self, CookieRecord};

/// The console entry point, model query parameters included. Not configurable:
/// the harvest endpoint markers and UI selectors are specific to this console.
pub const ENTRY_URL: &str = "https://console.cloud.google.com/vertex-ai/studio/multimodal?mode=prompt&model=gemini-2.5-flash-lite-preview-09-2025";

/// Environment variable holding the initial cookie payload, read once at
/// construction. Later payloads arrive through [`Harvester::update_cookies`].
pub const COOKIES_ENV_VAR: &str = "GOOGLE_COOKIES";

/// The console serves a different (and less automatable) shell to unknown
/// user agents, so the browser announces a common desktop Chrome.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const NAV_TIMEOUT: Duration = Duration::from_secs(60);
const RELOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Settle time after a reload or login re-navigation before interacting.
const POST_RELOAD_SETTLE: Duration = Duration::from_secs(5);
/// Cooldown after a failed or expired session cycle, so a persistent failure
/// does not become a hot loop.
const ERROR_PAUSE: Duration = Duration::from_secs(10);
/// A second login redirect within this window means the cookies are dead.
const LOGIN_RETRY_COOLDOWN_SECS: u64 = 60;
/// Maximum tolerated age of the last harvest before a new one is provoked.
const STALENESS_SECS: u64 = 2700;

/// Why one session cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionExit {
    /// A cookie update asked for a relaunch; no pause before the next cycle.
    Restart,
    /// Login page seen twice inside the retry cooldown; cookies presumed dead.
    LoginExpired,
    /// The harvester was stopped.
    Stopped,
}

/// What the polling loop should do on this tick, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollStep {
    /// Reload the page and immediately re-run an interaction cycle
    Refresh,
    /// Navigate back to the console entry URL once
    RetryLogin,
    /// Give up on this session; cookies are dead
    ExpireLogin,
    /// Provoke a harvest with one interaction cycle
    Interact,
    /// Nothing to do until the next tick
    Idle,
}

/// Pure transition logic for one ACTIVE-loop tick.
fn next_step(
    refresh_needed: bool,
    login_redirected: bool,
    now: u64,
    last_login_retry: u64,
    last_harvest: u64,
    sink_has_harvest: bool,
) -> PollStep {
    if refresh_needed {
        return PollStep::Refresh;
    }
    if login_redirected {
        return if now.saturating_sub(last_login_retry) > LOGIN_RETRY_COOLDOWN_SECS {
            PollStep::RetryLogin
        } else {
            PollStep::ExpireLogin
        };
    }
    if !sink_has_harvest || now.saturating_sub(last_harvest) > STALENESS_SECS {
        return PollStep::Interact;
    }
    PollStep::Idle
}

/// The harvester: one browser session's lifecycle at a time, looping until
/// stopped.
pub struct Harvester {
    state: Arc<SessionState>,
    sink: Arc<dyn CredentialSink>,
    headless: bool,
}

impl Harvester {
    /// Create a harvester. Initial cookies are read from [`COOKIES_ENV_VAR`]
    /// if present; they are validated only at launch, never here.
    pub fn new(sink: Arc<dyn CredentialSink>, headless: bool) -> Self {
        let initial_cookies = std::env::var(COOKIES_ENV_VAR).ok();
        if initial_cookies.is_some() {
            info!("Using initial cookie payload from {}", COOKIES_ENV_VAR);
        }
        Self {
            state: Arc::new(SessionState::new(initial_cookies)),
            sink,
            headless,
        }
    }

    /// Replace the stored cookies and schedule a restart. The payload is not
    /// validated here; a bad one is discarded at the next LAUNCHING phase.
    pub fn update_cookies(&self, cookies_json: impl Into<String>) {
        info!("Received new cookies; scheduling restart");
        self.state.replace_cookies(cookies_json.into());
        self.state.request_restart();
    }

    /// Stop the harvester at the next checkpoint. In-flight browser work is
    /// not forcibly cancelled.
    pub fn stop(&self) {
        self.state.stop();
    }

    /// Shared session state, for health observation (timestamps, flags).
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run until stopped. Every session-cycle error is absorbed here: logged,
    /// followed by a cooldown pause, then a full relaunch.
    pub async fn run(&self) {
        if !self.state.begin_run() {
            return;
        }
        info!("Cloud harvester starting");

        while self.state.is_running() {
            match self.run_session().await {
                Ok(SessionExit::Restart) => {
                    info!("Restarting with new cookies");
                }
                Ok(SessionExit::Stopped) => break,
                Ok(SessionExit::LoginExpired) => {
                    error!("Session cookies expired (login page detected)");
                    sleep(ERROR_PAUSE).await;
                }
                Err(e) => {
                    error!("Session cycle failed: {:#}", e);
                    sleep(ERROR_PAUSE).await;
                }
            }
        }

        info!("Cloud harvester stopped");
    }

    /// One full LAUNCHING -> TORN_DOWN cycle. The browser is closed on every
    /// path out of here, error paths included.
    async fn run_session(&self) -> Result<SessionExit> {
        let (mut browser, handler_task) = self.launch_browser().await?;

        let result = self.drive_session(&browser).await;

        // TORN_DOWN: close unconditionally
        if let Err(e) = browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        let _ = browser.wait().await;
        handler_task.abort();

        result
    }

    /// LAUNCHING (page, cookies, observers) through ACTIVE.
    async fn drive_session(&self, browser: &Browser) -> Result<SessionExit> {
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open a page")?;

        self.apply_cookies(&page).await?;

        // Observers must be registered before navigating: a response can
        // arrive immediately after the first request goes out.
        page.execute(network::EnableParams::default())
            .await
            .map_err(|e| HarvestError::Cdp(e.to_string()))?;
        let classifier_task = classifier::attach(&page, Arc::clone(&self.state)).await?;
        let interceptor_task =
            interceptor::attach(&page, Arc::clone(&self.state), Arc::clone(&self.sink)).await?;

        // NAVIGATING: failure is non-fatal; the page may partially load and
        // the polling loop self-corrects from there.
        info!("Navigating to {}", ENTRY_URL);
        match timeout(NAV_TIMEOUT, page.goto(ENTRY_URL)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Navigation failed: {}", e),
            Err(_) => warn!("Navigation timed out after {:?}", NAV_TIMEOUT),
        }

        self.state.clear_restart();
        self.state.clear_refresh();

        let exit = self.poll_loop(&page).await;

        classifier_task.abort();
        interceptor_task.abort();
        Ok(exit)
    }

    /// Inject the stored cookie payload, if any. A parse failure discards the
    /// payload and aborts the cycle; navigation never proceeds with
    /// half-applied state.
    async fn apply_cookies(&self, page: &Page) -> Result<()> {
        let Some(raw) = self.state.cookie_payload() else {
            return Ok(());
        };

        let records = match types::parse_cookies(&raw) {
            Ok(records) => records,
            Err(e) => {
                error!("Invalid JSON in cookie payload; discarding it");
                self.state.discard_cookies();
                return Err(HarvestError::InvalidCookies(e).into());
            }
        };

        let count = records.len();
        page.set_cookies(cookie_params(&records))
            .await
            .context("Failed to apply session cookies")?;
        info!("Loaded {} cookies", count);
        Ok(())
    }

    /// ACTIVE: the polling loop. Exits on stop, restart request, or expired
    /// login.
    async fn poll_loop(&self, page: &Page) -> SessionExit {
        loop {
            if !self.state.is_running() {
                return SessionExit::Stopped;
            }
            if self.state.restart_requested() {
                return SessionExit::Restart;
            }

            let step = next_step(
                self.state.refresh_needed(),
                self.login_redirected(page).await,
                now_secs(),
                self.state.last_login_retry(),
                self.state.last_harvest(),
                self.sink.latest().await.is_some(),
            );

            match step {
                PollStep::Refresh => {
                    info!("Token invalid, expired, or resources exhausted; refreshing page");
                    // Cleared whether or not the reload works; repeated
                    // failure signals will simply set it again.
                    self.state.clear_refresh();
                    match timeout(RELOAD_TIMEOUT, page.reload()).await {
                        Ok(Ok(_)) => {
                            sleep(POST_RELOAD_SETTLE).await;
                            self.run_interaction(page).await;
                        }
                        Ok(Err(e)) => warn!("Refresh failed: {}", e),
                        Err(_) => warn!("Refresh timed out after {:?}", RELOAD_TIMEOUT),
                    }
                    continue;
                }
                PollStep::RetryLogin => {
                    warn!("Redirected to login; navigating back to the console");
                    self.state.record_login_retry(now_secs());
                    match timeout(NAV_TIMEOUT, page.goto(ENTRY_URL)).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!("Login-retry navigation failed: {}", e),
                        Err(_) => warn!("Login-retry navigation timed out"),
                    }
                    sleep(POST_RELOAD_SETTLE).await;
                    continue;
                }
                PollStep::ExpireLogin => {
                    return SessionExit::LoginExpired;
                }
                PollStep::Interact => {
                    self.run_interaction(page).await;
                }
                PollStep::Idle => {}
            }

            sleep(POLL_INTERVAL).await;
        }
    }

    async fn run_interaction(&self, page: &Page) {
        let dom = PageDom::new(page.clone());
        let driver = InteractionDriver::new(&dom, &self.state);
        let report = driver.run_cycle().await;
        debug!("Interaction cycle finished: {:?}", report.steps());
    }

    async fn login_redirected(&self, page: &Page) -> bool {
        let url = page.url().await.ok().flatten().unwrap_or_default();
        let title = page.get_title().await.ok().flatten().unwrap_or_default();
        crate::obstruction::is_login_redirect(&url, &title)
    }

    /// LAUNCHING: fresh browser with a realistic user agent, plus the event
    /// handler task that pumps the CDP connection.
    async fn launch_browser(&self) -> Result<(Browser, JoinHandle<()>)> {
        let mut builder = BrowserConfig::builder()
            .arg(format!("--user-agent={}", USER_AGENT))
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(HarvestError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!("Browser event handler exited");
        });

        Ok((browser, handler_task))
    }
}

/// Convert parsed cookie records to CDP cookie parameters. A record the
/// protocol rejects is skipped with a warning rather than failing the launch.
fn cookie_params(records: &[CookieRecord]) -> Vec<CookieParam> {
    records
        .iter()
        .filter_map(|record| {
            let mut builder = CookieParam::builder()
                .name(record.name.clone())
                .value(record.value.clone());
            if let Some(domain) = &record.domain {
                builder = builder.domain(domain.clone());
            }
            if let Some(path) = &record.path {
                builder = builder.path(path.clone());
            }
            if let Some(expires) = record.expires {
                builder = builder.expires(TimeSinceEpoch::new(expires));
            }
            if let Some(secure) = record.secure {
                builder = builder.secure(secure);
            }
            if let Some(http_only) = record.http_only {
                builder = builder.http_only(http_only);
            }
            if let Some(same_site) = &record.same_site {
                builder = builder.same_site(match same_site.as_str() {
                    "Strict" => CookieSameSite::Strict,
                    "None" => CookieSameSite::None,
                    _ => CookieSameSite::Lax,
                });
            }
            match builder.build() {
                Ok(param) => Some(param),
                Err(e) => {
                    warn!("Skipping malformed cookie '{}': {}", record.name, e);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "harvester_test.rs"]
mod harvester_test;
