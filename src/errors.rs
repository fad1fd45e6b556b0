use thiserror::Error;

/// Failure classes for one session cycle.
///
/// None of these ever reach a caller of the harvester: the outer loop logs
/// them, pauses, and relaunches. They exist so the log line says which stage
/// of LAUNCHING gave up.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The stored cookie payload was not a valid cookie collection; it has
    /// been discarded and the next launch proceeds cookie-less.
    #[error("invalid cookie JSON: {0}")]
    InvalidCookies(#[from] serde_json::Error),

    /// The browser could not be launched at all.
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// Wiring the network observers onto the page failed.
    #[error("CDP wiring failed: {0}")]
    Cdp(String),
}
