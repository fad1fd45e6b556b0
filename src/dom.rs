//! Capability interface over the automation backend.
//!
//! The interaction driver only speaks in these semantic operations, so the
//! bilingual label matching and accept/disagree disambiguation stay
//! backend-agnostic and unit-testable against a scripted DOM. [`PageDom`]
//! implements the interface over a CDP page.

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::Page;
use tokio::time::{Duration, Instant, sleep};

/// How often visibility waits re-check the page.
const WAIT_PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Semantic DOM operations the interaction driver needs.
#[async_trait]
pub trait Dom: Send + Sync {
    /// Whether a selector matches an element that is actually rendered.
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// Inner text of the first match, or None when the selector matches
    /// nothing.
    async fn text_of(&self, selector: &str) -> Result<Option<String>>;

    /// Whether the page body contains the given text anywhere.
    async fn body_contains(&self, needle: &str) -> Result<bool>;

    /// Scroll an element's content to its bottom.
    async fn scroll_to_bottom(&self, selector: &str) -> Result<()>;

    /// Click the first element matching a selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Find a visible element of `tag` whose text contains any `include`
    /// phrase and none of the `exclude` phrases, and click it. Returns whether
    /// anything was clicked.
    async fn click_matching_text(
        &self,
        tag: &str,
        include: &[&str],
        exclude: &[&str],
    ) -> Result<bool>;

    /// Empty an editable element's content.
    async fn clear_text(&self, selector: &str) -> Result<()>;

    /// Focus an element and type text into it.
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Press the commit key on an element.
    async fn press_enter(&self, selector: &str) -> Result<()>;

    /// Wait until a selector becomes visible. Returns false on timeout.
    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Wait until a selector disappears. Returns false on timeout.
    async fn wait_for_hidden(&self, selector: &str, timeout: Duration) -> Result<bool>;
}

/// Whether element text satisfies an include/exclude phrase pair.
///
/// This is the whole of the label-matching logic: the agree button matches
/// "Agree" but must not match "Disagree".
pub fn text_matches(text: &str, include: &[&str], exclude: &[&str]) -> bool {
    include.iter().any(|phrase| text.contains(phrase))
        && !exclude.iter().any(|phrase| text.contains(phrase))
}

/// Build the in-page script for [`Dom::click_matching_text`].
///
/// Mirrors [`text_matches`] in JS over live elements; skips elements that are
/// not rendered, re-enables a disabled target before clicking, and prefers an
/// inner `<input>` when one exists (Material checkboxes swallow clicks on the
/// host element).
pub(crate) fn matching_click_script(tag: &str, include: &[&str], exclude: &[&str]) -> String {
    format!(
        r#"(() => {{
            const include = {include};
            const exclude = {exclude};
            const nodes = Array.from(document.querySelectorAll({tag}));
            const target = nodes.find(n => {{
                if (!(n.offsetWidth || n.offsetHeight || n.getClientRects().length)) return false;
                const text = n.innerText || '';
                return include.some(p => text.includes(p)) && !exclude.some(p => text.includes(p));
            }});
            if (!target) return false;
            if (target.disabled) target.disabled = false;
            const input = target.querySelector('input');
            if (input) input.click(); else target.click();
            return true;
        }})()"#,
        tag = js_string(tag),
        include = js_string_array(include),
        exclude = js_string_array(exclude),
    )
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn js_string_array(values: &[&str]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

/// [`Dom`] implemented over a chromiumoxide page.
#[derive(Clone)]
pub struct PageDom {
    page: Page,
}

impl PageDom {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    async fn eval_bool(&self, script: String) -> Result<bool> {
        let value: bool = self.page.evaluate(script).await?.into_value()?;
        Ok(value)
    }
}

#[async_trait]
impl Dom for PageDom {
    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                const style = getComputedStyle(el);
                return rect.width > 0 && rect.height > 0
                    && style.visibility !== 'hidden' && style.display !== 'none';
            }})()"#,
            sel = js_string(selector),
        );
        self.eval_bool(script).await
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                return el ? el.innerText : null;
            }})()"#,
            sel = js_string(selector),
        );
        let value: Option<String> = self.page.evaluate(script).await?.into_value()?;
        Ok(value)
    }

    async fn body_contains(&self, needle: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                return !!document.body && document.body.innerText.includes({needle});
            }})()"#,
            needle = js_string(needle),
        );
        self.eval_bool(script).await
    }

    async fn scroll_to_bottom(&self, selector: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (el) el.scrollTop = el.scrollHeight;
            }})()"#,
            sel = js_string(selector),
        );
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn click_matching_text(
        &self,
        tag: &str,
        include: &[&str],
        exclude: &[&str],
    ) -> Result<bool> {
        self.eval_bool(matching_click_script(tag, include, exclude))
            .await
    }

    async fn clear_text(&self, selector: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (el) el.innerText = '';
            }})()"#,
            sel = js_string(selector),
        );
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn press_enter(&self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await?
            .press_key("Enter")
            .await?;
        Ok(())
    }

    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(selector).await.unwrap_or(false) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(WAIT_PROBE_INTERVAL).await;
        }
    }

    async fn wait_for_hidden(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_visible(selector).await.unwrap_or(true) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(WAIT_PROBE_INTERVAL).await;
        }
    }
}

#[cfg(test)]
#[path = "dom_test.rs"]
mod dom_test;
