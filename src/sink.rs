//! Credential sink boundary: where harvested artifacts leave the harvester.
//!
//! Persistence and replay of the captured template are the consumer's
//! business; the harvester only needs to hand artifacts over, check whether
//! one exists at all, and fire the completion signal.

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Duration, Instant, timeout_at};

use crate::types::HarvestedArtifact;

/// Receives harvested artifacts and tracks their freshness.
#[async_trait]
pub trait CredentialSink: Send + Sync {
    /// Take ownership of a freshly captured artifact.
    async fn update(&self, artifact: HarvestedArtifact);

    /// The most recent artifact, if any harvest has ever succeeded.
    async fn latest(&self) -> Option<HarvestedArtifact>;

    /// The completion signal fired after every successful harvest.
    fn signal(&self) -> &HarvestSignal;
}

/// Single-slot, re-armable completion event.
///
/// The interceptor sets it on every successful harvest, not only the first.
/// Consumers wait with their own timeout and must [`clear`](Self::clear) it
/// themselves before waiting for the next harvest.
#[derive(Debug, Default)]
pub struct HarvestSignal {
    set: std::sync::Mutex<bool>,
    notify: Notify,
}

impl HarvestSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        *set = true;
        drop(set);
        self.notify.notify_waiters();
    }

    /// Re-arm the signal for the next harvest.
    pub fn clear(&self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        *set = false;
    }

    pub fn is_set(&self) -> bool {
        *self.set.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait until the signal is set, up to `timeout`. Returns whether it was
    /// set by the time the wait ended.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register the waiter before checking the flag so a set() between
            // the check and the await is not lost.
            notified.as_mut().enable();
            if self.is_set() {
                return true;
            }
            if timeout_at(deadline, notified).await.is_err() {
                return self.is_set();
            }
        }
    }
}

/// In-memory sink: keeps the latest artifact and the completion signal.
#[derive(Debug, Default)]
pub struct MemorySink {
    latest: Mutex<Option<HarvestedArtifact>>,
    signal: HarvestSignal,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialSink for MemorySink {
    async fn update(&self, artifact: HarvestedArtifact) {
        let mut latest = self.latest.lock().await;
        *latest = Some(artifact);
    }

    async fn latest(&self) -> Option<HarvestedArtifact> {
        self.latest.lock().await.clone()
    }

    fn signal(&self) -> &HarvestSignal {
        &self.signal
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_test;
