//! UI interaction driver: one best-effort cycle of scripted DOM interactions
//! that provokes the console into issuing the target request.
//!
//! Every step independently tolerates the absence of its target element and
//! reports a tri-state outcome instead of silently discarding failures. The
//! cycle never raises out to the controller.

use anyhow::Result;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::dom::Dom;
use crate::obstruction;
use crate::session_state::SessionState;

/// Container the console uses for error and quota dialogs.
pub const ERROR_DIALOG_SELECTOR: &str = r#"div[role="dialog"]"#;
/// Content region of the terms-of-service modal.
pub const TERMS_DIALOG_SELECTOR: &str = "div.mat-mdc-dialog-content";
/// The prompt editor the probe is typed into.
pub const EDITOR_SELECTOR: &str = r#"div[contenteditable="true"]"#;
/// Fixed probe string; its only job is to trigger a generation request.
pub const PROBE_TEXT: &str = "Hello";

const ACCEPT_TERMS_PHRASES: [&str; 2] = ["Accept terms of use", "接受使用条款"];
const AGREE_PHRASES: [&str; 2] = ["Agree", "同意"];
// "不同意" contains "同意", so the bilingual disagree labels must be excluded
const DISAGREE_PHRASES: [&str; 2] = ["Disagree", "不同意"];
/// Attribute-addressable dismiss buttons.
const POPUP_SELECTORS: [&str; 2] = [
    r#"button[aria-label="Close"]"#,
    r#"button[aria-label="Dismiss"]"#,
];
/// Dismiss buttons only addressable by their label.
const POPUP_BUTTON_LABELS: [&str; 3] = ["Got it", "OK", "Dismiss"];
/// Marker text of the console's own sign-in nag popup.
const SIGNIN_POPUP_TEXT: &str = "Sign in to continue using Vertex AI";

const SCROLL_SETTLE: Duration = Duration::from_millis(500);
const CHECKBOX_SETTLE: Duration = Duration::from_millis(1500);
const DIALOG_HIDE_WAIT: Duration = Duration::from_secs(3);
const POPUP_SETTLE: Duration = Duration::from_secs(1);
const EDITOR_WAIT: Duration = Duration::from_secs(8);
const PRE_SUBMIT_SETTLE: Duration = Duration::from_millis(500);
/// How long to give the network layer to emit the provoked request after
/// submitting the probe; the interceptor observes it asynchronously.
const NETWORK_SETTLE: Duration = Duration::from_secs(5);

/// The five steps of one interaction cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ExhaustionCheck,
    TermsDialog,
    DismissPopups,
    SigninPopup,
    ProbeSubmit,
}

/// What became of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step found its target and acted on it
    Applied,
    /// The target element or state was not present; nothing to do
    Absent,
    /// The step found work but an operation on the page failed
    Failed,
}

/// Observable record of one interaction cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    steps: Vec<(Step, StepOutcome)>,
}

impl CycleReport {
    fn push(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push((step, outcome));
    }

    pub fn outcome_of(&self, step: Step) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| *outcome)
    }

    pub fn steps(&self) -> &[(Step, StepOutcome)] {
        &self.steps
    }

    /// Whether the cycle stopped early at the exhaustion check.
    pub fn aborted(&self) -> bool {
        self.steps.len() == 1 && self.outcome_of(Step::ExhaustionCheck) == Some(StepOutcome::Applied)
    }
}

/// Drives one harvest-provoking interaction cycle on the current page.
pub struct InteractionDriver<'a, D: Dom + ?Sized> {
    dom: &'a D,
    state: &'a SessionState,
}

impl<'a, D: Dom + ?Sized> InteractionDriver<'a, D> {
    pub fn new(dom: &'a D, state: &'a SessionState) -> Self {
        Self { dom, state }
    }

    /// Run the full cycle. Never raises; every step's result lands in the
    /// report and failures are logged where they happen.
    pub async fn run_cycle(&self) -> CycleReport {
        info!("Attempting to trigger a generation request");
        let mut report = CycleReport::default();

        let outcome = self.check_exhaustion().await;
        report.push(Step::ExhaustionCheck, outcome);
        if outcome == StepOutcome::Applied {
            // The provider is rejecting the session; interacting further is
            // pointless until the controller reloads.
            return report;
        }

        report.push(Step::TermsDialog, self.handle_terms_dialog().await);
        report.push(Step::DismissPopups, self.dismiss_popups().await);
        report.push(Step::SigninPopup, self.dismiss_signin_popup().await);
        report.push(Step::ProbeSubmit, self.submit_probe().await);
        report
    }

    async fn check_exhaustion(&self) -> StepOutcome {
        match self.try_check_exhaustion().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Resource-exhaustion check failed: {}", e);
                StepOutcome::Failed
            }
        }
    }

    async fn try_check_exhaustion(&self) -> Result<StepOutcome> {
        if !self.dom.is_visible(ERROR_DIALOG_SELECTOR).await? {
            return Ok(StepOutcome::Absent);
        }
        let text = self
            .dom
            .text_of(ERROR_DIALOG_SELECTOR)
            .await?
            .unwrap_or_default();
        if obstruction::is_exhaustion_text(&text) {
            warn!(
                "Error dialog detected ('{}'); marking session for refresh",
                truncate(&text, 30)
            );
            self.state.mark_refresh_needed();
            Ok(StepOutcome::Applied)
        } else {
            Ok(StepOutcome::Absent)
        }
    }

    async fn handle_terms_dialog(&self) -> StepOutcome {
        match self.try_handle_terms_dialog().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Terms dialog handling failed: {}", e);
                StepOutcome::Failed
            }
        }
    }

    async fn try_handle_terms_dialog(&self) -> Result<StepOutcome> {
        if !self.dom.is_visible(TERMS_DIALOG_SELECTOR).await? {
            return Ok(StepOutcome::Absent);
        }
        info!("Terms dialog detected; accepting");

        // Scroll first so the checkbox is not covered when clicked
        self.dom.scroll_to_bottom(TERMS_DIALOG_SELECTOR).await?;
        sleep(SCROLL_SETTLE).await;

        self.dom
            .click_matching_text("mat-checkbox", &ACCEPT_TERMS_PHRASES, &[])
            .await?;
        sleep(CHECKBOX_SETTLE).await;

        let agreed = self
            .dom
            .click_matching_text("button", &AGREE_PHRASES, &DISAGREE_PHRASES)
            .await?;
        if !agreed {
            warn!("Terms dialog visible but no agree button found");
            return Ok(StepOutcome::Failed);
        }

        // Timeout here is non-fatal; the next cycle will see the dialog again
        if self
            .dom
            .wait_for_hidden(TERMS_DIALOG_SELECTOR, DIALOG_HIDE_WAIT)
            .await
            .unwrap_or(false)
        {
            debug!("Terms dialog closed");
        } else {
            debug!("Terms dialog still visible after agreeing");
        }
        Ok(StepOutcome::Applied)
    }

    async fn dismiss_popups(&self) -> StepOutcome {
        let mut any = false;
        for selector in POPUP_SELECTORS {
            match self.dom.is_visible(selector).await {
                Ok(true) => {
                    if self.dom.click(selector).await.is_ok() {
                        debug!("Dismissed popup via {}", selector);
                        any = true;
                    }
                }
                Ok(false) => {}
                Err(e) => debug!("Popup check failed for {}: {}", selector, e),
            }
        }
        for label in POPUP_BUTTON_LABELS {
            match self.dom.click_matching_text("button", &[label], &[]).await {
                Ok(true) => {
                    debug!("Dismissed popup via '{}' button", label);
                    any = true;
                }
                Ok(false) => {}
                Err(e) => debug!("Popup check failed for '{}': {}", label, e),
            }
        }
        if any {
            StepOutcome::Applied
        } else {
            StepOutcome::Absent
        }
    }

    async fn dismiss_signin_popup(&self) -> StepOutcome {
        match self.try_dismiss_signin_popup().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Sign-in popup handling failed: {}", e);
                StepOutcome::Failed
            }
        }
    }

    async fn try_dismiss_signin_popup(&self) -> Result<StepOutcome> {
        if !self.dom.body_contains(SIGNIN_POPUP_TEXT).await? {
            return Ok(StepOutcome::Absent);
        }
        warn!("'{}' popup detected; dismissing", SIGNIN_POPUP_TEXT);
        let dismissed = self
            .dom
            .click_matching_text("button", &["Dismiss"], &[])
            .await?;
        sleep(POPUP_SETTLE).await;
        if dismissed {
            Ok(StepOutcome::Applied)
        } else {
            Ok(StepOutcome::Failed)
        }
    }

    async fn submit_probe(&self) -> StepOutcome {
        match self.try_submit_probe().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Probe submission failed: {}", e);
                StepOutcome::Failed
            }
        }
    }

    async fn try_submit_probe(&self) -> Result<StepOutcome> {
        debug!("Waiting for the prompt editor");
        if !self
            .dom
            .wait_for_visible(EDITOR_SELECTOR, EDITOR_WAIT)
            .await?
        {
            // Page may still be loading, or needs the refresh the classifier
            // will request; skipping is fine.
            info!("Editor not present; skipping probe submission");
            return Ok(StepOutcome::Absent);
        }

        self.dom.click(EDITOR_SELECTOR).await?;
        self.dom.clear_text(EDITOR_SELECTOR).await?;
        self.dom.type_text(EDITOR_SELECTOR, PROBE_TEXT).await?;
        sleep(PRE_SUBMIT_SETTLE).await;

        info!("Submitting probe prompt '{}'", PROBE_TEXT);
        self.dom.press_enter(EDITOR_SELECTOR).await?;

        // Give the network layer time to emit the provoked request
        sleep(NETWORK_SETTLE).await;
        Ok(StepOutcome::Applied)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
#[path = "interaction_test.rs"]
mod interaction_test;
