//! Polling for transient UI signals
//!
//! Toasts and snackbars can appear and auto-dismiss between two checks and
//! the page offers no subscription for them, so detection is a bounded
//! loop: look, sleep a fixed interval, look again until the budget is
//! spent. Running out of budget is a normal `false`, never an error.

use regex::{Regex, RegexBuilder};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::browser::{Locator, LocatorChain, Page};
use crate::common::{Error, Result};

/// Elements that commonly host notifications across UI frameworks
pub const TOAST_SELECTORS: &[&str] = &[
    ".Toastify__toast-body",
    ".Toastify__toast",
    ".MuiSnackbar-root",
    ".snackbar",
    ".toast",
    "[role=\"alert\"]",
    "[role=\"status\"]",
    "[aria-live=\"assertive\"]",
    "[aria-live=\"polite\"]",
];

/// Poll interval of the login workflow
pub const LOGIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll interval of the requirement-creation workflow
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// The union of all [`TOAST_SELECTORS`]
pub fn toast_region() -> Locator {
    Locator::css(TOAST_SELECTORS.join(", "))
}

/// Case-insensitive text pattern a signal must match
#[derive(Debug, Clone)]
pub struct SignalPattern(Regex);

impl SignalPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(Self)
            .map_err(|e| Error::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Run `probe` every `interval` until it yields a value or `timeout` elapses
///
/// A zero timeout returns `None` without probing.
pub async fn poll_for<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(found) = probe().await {
            return Some(found);
        }
        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        tokio::time::sleep(interval.min(remaining)).await;
    }
    None
}

/// Run `probe` every `interval` until it returns `true` or `timeout` elapses
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_for(timeout, interval, || {
        let check = probe();
        async move { check.await.then_some(()) }
    })
    .await
    .is_some()
}

/// Wait until the first match of `locator` is visible
pub async fn wait_visible(
    page: &dyn Page,
    locator: &Locator,
    timeout: Duration,
    interval: Duration,
) -> bool {
    poll_until(timeout, interval, move || async move {
        page.is_visible(locator).await.unwrap_or(false)
    })
    .await
}

/// Wait until some strategy of `chain` has a visible match and return it
pub async fn wait_resolve(
    page: &dyn Page,
    chain: &LocatorChain,
    timeout: Duration,
    interval: Duration,
) -> Option<Locator> {
    poll_for(timeout, interval, move || async move {
        chain.resolve(page).await.cloned()
    })
    .await
}

/// Watches a notification region for text matching a pattern
#[derive(Debug, Clone)]
pub struct SignalPoller {
    region: Locator,
    interval: Duration,
}

impl SignalPoller {
    pub fn new(region: Locator, interval: Duration) -> Self {
        Self { region, interval }
    }

    /// Poller over the default toast region
    pub fn toasts(interval: Duration) -> Self {
        Self::new(toast_region(), interval)
    }

    /// `true` as soon as any region element's text matches `pattern`,
    /// `false` once `timeout` has elapsed without a match
    pub async fn await_signal(
        &self,
        page: &dyn Page,
        pattern: &SignalPattern,
        timeout: Duration,
    ) -> bool {
        let seen = poll_until(timeout, self.interval, move || self.matches_now(page, pattern)).await;
        tracing::debug!(
            pattern = pattern.as_str(),
            timeout_ms = timeout.as_millis() as u64,
            seen,
            "Signal poll finished"
        );
        seen
    }

    /// One poll: enumerate the region and test each element's text
    async fn matches_now(&self, page: &dyn Page, pattern: &SignalPattern) -> bool {
        let count = match page.count(&self.region).await {
            Ok(count) => count,
            Err(e) => {
                tracing::trace!(error = %e, "Region enumeration failed");
                return false;
            }
        };

        for index in 0..count {
            // Toasts dismiss themselves; a node gone since `count` is just not a match
            match page.text_of(&self.region, index).await {
                Ok(Some(text)) if pattern.is_match(&text) => return true,
                Ok(_) => {}
                Err(e) => tracing::trace!(index, error = %e, "Toast vanished before read"),
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::{MockElement, MockPage};

    fn pattern(p: &str) -> SignalPattern {
        SignalPattern::new(p).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_returns_false_without_reading() {
        let page = MockPage::new();
        page.place(toast_region(), MockElement::new("User Logged in Successfully"));
        let poller = SignalPoller::toasts(LOGIN_POLL_INTERVAL);

        let seen = poller
            .await_signal(&page, &pattern("User Logged in Successfully"), Duration::ZERO)
            .await;

        assert!(!seen);
        assert_eq!(page.reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detects_late_toast_case_insensitively() {
        let page = MockPage::new();
        page.place(
            toast_region(),
            MockElement::new("USER LOGGED IN SUCCESSFULLY").after(Duration::from_millis(1200)),
        );
        let poller = SignalPoller::toasts(LOGIN_POLL_INTERVAL);

        let start = Instant::now();
        let seen = poller
            .await_signal(&page, &pattern("User Logged in Successfully"), Duration::from_secs(5))
            .await;

        assert!(seen);
        assert!(start.elapsed() < Duration::from_millis(1400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_on_mismatching_toasts() {
        let page = MockPage::new();
        page.place(toast_region(), MockElement::new("Invalid credentials"));
        let poller = SignalPoller::toasts(LOGIN_POLL_INTERVAL);

        let start = Instant::now();
        let seen = poller
            .await_signal(&page, &pattern("logged in"), Duration::from_millis(500))
            .await;

        assert!(!seen);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_element_is_not_fatal() {
        let page = MockPage::new();
        page.place(toast_region(), MockElement::new("Saved").unreadable());
        page.place(
            toast_region(),
            MockElement::new("Requirement created").after(Duration::from_millis(300)),
        );
        let poller = SignalPoller::toasts(READINESS_POLL_INTERVAL);

        let seen = poller
            .await_signal(&page, &pattern("(created|success|saved)"), Duration::from_secs(7))
            .await;

        assert!(seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_dismissed_before_poll_window() {
        let page = MockPage::new();
        page.place(
            toast_region(),
            MockElement::new("Saved").vanishes_after(Duration::from_millis(50)),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        let poller = SignalPoller::toasts(READINESS_POLL_INTERVAL);

        let seen = poller
            .await_signal(&page, &pattern("saved"), Duration::from_millis(400))
            .await;

        assert!(!seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_polls_agree() {
        let page = MockPage::new();
        page.place(toast_region(), MockElement::new("Requirement saved"));
        let poller = SignalPoller::toasts(READINESS_POLL_INTERVAL);
        let p = pattern("saved");

        let first = poller.matches_now(&page, &p).await;
        let second = poller.matches_now(&page, &p).await;
        assert!(first && second);
        assert_eq!(page.reads(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_visible() {
        let page = MockPage::new();
        let heading = Locator::role("heading", "Readiness Overview");
        page.place(heading.clone(), MockElement::new("Readiness Overview").after(Duration::from_secs(2)));

        assert!(!wait_visible(&page, &heading, Duration::from_secs(1), LOGIN_POLL_INTERVAL).await);
        assert!(wait_visible(&page, &heading, Duration::from_secs(10), LOGIN_POLL_INTERVAL).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_resolve_takes_first_visible_strategy() {
        let page = MockPage::new();
        let by_role = Locator::role("menuitem", "create requirement");
        let loose = Locator::loose_text("requirement");
        page.place(by_role.clone(), MockElement::new("Create Requirement").hidden());
        page.place(loose.clone(), MockElement::new("Requirements").after(Duration::from_millis(500)));
        let chain = by_role.or(loose.clone());

        let found = wait_resolve(&page, &chain, Duration::from_secs(3), LOGIN_POLL_INTERVAL).await;
        assert_eq!(found, Some(loose));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(SignalPattern::new("(unclosed"), Err(Error::Pattern { .. })));
    }
}
