use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared session state owned by the lifecycle controller.
///
/// The polling loop and the network-event callbacks both touch these fields,
/// so every flag and timestamp is a single atomic word: a reader can never
/// observe a half-applied update. Transitions happen only through the named
/// methods here, never by poking fields from outside.
#[derive(Debug, Default)]
pub struct SessionState {
    running: AtomicBool,
    restart_requested: AtomicBool,
    refresh_needed: AtomicBool,
    /// Unix seconds of the last successful harvest; 0 = never
    last_harvest: AtomicU64,
    /// Unix seconds of the last login-redirect retry; 0 = none pending
    last_login_retry: AtomicU64,
    /// Serialized cookie payload applied at the next launch
    cookies: Mutex<Option<String>>,
}

/// Current wall-clock time as Unix seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl SessionState {
    pub fn new(initial_cookies: Option<String>) -> Self {
        Self {
            cookies: Mutex::new(initial_cookies),
            ..Default::default()
        }
    }

    /// Mark the harvester as running. Returns false if it already was.
    pub fn begin_run(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }

    pub fn clear_restart(&self) {
        self.restart_requested.store(false, Ordering::SeqCst);
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }

    /// Set by the response classifier and the exhaustion-dialog check; cleared
    /// only by the controller when it reloads the page.
    pub fn mark_refresh_needed(&self) {
        self.refresh_needed.store(true, Ordering::SeqCst);
    }

    pub fn clear_refresh(&self) {
        self.refresh_needed.store(false, Ordering::SeqCst);
    }

    pub fn refresh_needed(&self) -> bool {
        self.refresh_needed.load(Ordering::SeqCst)
    }

    pub fn record_harvest(&self, now: u64) {
        self.last_harvest.store(now, Ordering::SeqCst);
    }

    pub fn last_harvest(&self) -> u64 {
        self.last_harvest.load(Ordering::SeqCst)
    }

    pub fn record_login_retry(&self, now: u64) {
        self.last_login_retry.store(now, Ordering::SeqCst);
    }

    /// A successful harvest proves the session is authenticated, so the
    /// login-retry cooldown is cleared.
    pub fn clear_login_retry(&self) {
        self.last_login_retry.store(0, Ordering::SeqCst);
    }

    pub fn last_login_retry(&self) -> u64 {
        self.last_login_retry.load(Ordering::SeqCst)
    }

    /// Replace the stored cookie payload wholesale.
    pub fn replace_cookies(&self, json: String) {
        let mut slot = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(json);
    }

    /// Drop a payload that failed to parse at launch.
    pub fn discard_cookies(&self) {
        let mut slot = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    pub fn cookie_payload(&self) -> Option<String> {
        let slot = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }
}

#[cfg(test)]
#[path = "session_state_test.rs"]
mod session_state_test;
