//! Recognition of UI states that block the harvest: login redirects and
//! provider error dialogs. Pure string matching, independent of the browser
//! backend, so the controller's transition logic can be tested without one.

/// Identity-provider host that signals the session lost its authentication.
pub const LOGIN_HOST: &str = "accounts.google.com";

/// Dialog phrases that mean the provider is rejecting the session right now.
/// Bilingual: the console localizes these for Chinese-locale accounts.
pub const EXHAUSTION_PHRASES: [&str; 9] = [
    "Resources exhausted",
    "Resource has been exhausted",
    "资源用尽",
    "资源耗尽",
    "Quota exceeded",
    "配额已满",
    "Capacity reached",
    // Broad catch-alls: a generic error dialog also warrants a refresh
    "Something went wrong",
    "出错了",
];

/// Whether the page has been bounced to the identity provider's login flow.
///
/// Matches on the URL host (exact, not substring, so a console URL that merely
/// mentions the provider in a query parameter does not count) or on a "Sign in"
/// page title.
pub fn is_login_redirect(url: &str, title: &str) -> bool {
    if title.contains("Sign in") {
        return true;
    }
    match url::Url::parse(url) {
        Ok(parsed) => parsed.host_str() == Some(LOGIN_HOST),
        Err(_) => false,
    }
}

/// Whether dialog text matches a resource-exhaustion or generic error phrase.
pub fn is_exhaustion_text(text: &str) -> bool {
    EXHAUSTION_PHRASES.iter().any(|phrase| text.contains(phrase))
}

#[cfg(test)]
#[path = "obstruction_test.rs"]
mod obstruction_test;
