//! # credharvest
//!
//! Headless-browser harvester for a cloud console's generation API.
//!
//! The target API cannot be called directly: it requires a browser-derived
//! security token that is only emitted when the console's own UI issues a
//! real request. This crate drives a headless browser session against the
//! console, provokes it into sending that request, intercepts it on the wire,
//! and hands the captured template (URL, headers, body) to a credential sink.
//! It then keeps the template fresh as sessions expire, tokens rotate, and
//! the provider throttles requests.
//!
//! The core is the session lifecycle controller in [`harvester`]: a state
//! machine that owns the browser, decides when to (re)navigate, distinguishes
//! authentication loss from transient provider errors from UI obstructions,
//! and loops indefinitely until stopped. Everything else is a thin shell
//! around it.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use credharvest::{CredentialSink, Harvester, MemorySink};
//!
//! # async fn example() {
//! let sink = Arc::new(MemorySink::new());
//! let harvester = Arc::new(Harvester::new(sink.clone(), true));
//!
//! let runner = Arc::clone(&harvester);
//! tokio::spawn(async move { runner.run().await });
//!
//! // Wait for the first harvest, with our own timeout policy
//! if sink.signal().wait(std::time::Duration::from_secs(120)).await {
//!     sink.signal().clear(); // re-arm for the next harvest
//!     let artifact = sink.latest().await;
//!     println!("captured: {:?}", artifact.map(|a| a.url));
//! }
//!
//! // Rotate cookies at any time; takes effect at the next poll tick
//! harvester.update_cookies(r#"[{"name":"SID","value":"..."}]"#);
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

/// Response classification: auth/quota failure signatures on the wire
pub mod classifier;

/// Capability interface over the automation backend
pub mod dom;

/// Session-cycle error classes
pub mod errors;

/// The session lifecycle controller (the state machine)
pub mod harvester;

/// Scripted UI interactions that provoke the target request
pub mod interaction;

/// Outgoing-request interception and artifact extraction
pub mod interceptor;

/// Login-redirect and error-dialog recognition
pub mod obstruction;

/// Controller-owned shared session state
pub mod session_state;

/// Credential sink boundary and the harvest-complete signal
pub mod sink;

/// Data model: harvested artifacts and cookie records
pub mod types;

pub use harvester::{COOKIES_ENV_VAR, ENTRY_URL, Harvester};
pub use interaction::{CycleReport, Step, StepOutcome};
pub use session_state::SessionState;
pub use sink::{CredentialSink, HarvestSignal, MemorySink};
pub use types::{CookieRecord, HarvestedArtifact, parse_cookies};
