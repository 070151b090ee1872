//! Browser automation seam
//!
//! The suites only talk to a browser through the [`BrowserEngine`] and
//! [`Page`] traits. [`chrome`] implements them over the Chrome DevTools
//! Protocol; [`mock`] is a scripted in-memory page used by the tests.

pub mod chrome;
mod locator;
pub mod mock;

pub use locator::{Locator, LocatorChain};

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::common::{Error, Result};

/// A browser that can hand out isolated pages
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Project/variant name recorded with every outcome
    fn project(&self) -> &str;

    /// Open a page in a fresh, isolated browser context
    async fn open_page(&self) -> Result<Box<dyn Page>>;

    /// Release the browser
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Operations the suites perform on one page
///
/// Actions target the first visible element of a locator. Reads never
/// fail on a missing element: [`Page::text_of`] returns `Ok(None)` when the
/// element vanished between enumeration and read.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait for the DOM to be ready
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Replace the value of a form control
    async fn fill(&self, target: &Locator, value: &str) -> Result<()>;

    /// Click an element
    async fn click(&self, target: &Locator) -> Result<()>;

    /// Number of elements currently matching
    async fn count(&self, target: &Locator) -> Result<usize>;

    /// Visible text of the `index`-th match
    async fn text_of(&self, target: &Locator, index: usize) -> Result<Option<String>>;

    /// Whether the first match exists and is visible
    async fn is_visible(&self, target: &Locator) -> Result<bool>;

    /// Full-page PNG screenshot
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Start watching for a network response; must be called before the
    /// action that triggers the request
    async fn watch_response(&self, matcher: ResponseMatcher, timeout: Duration)
        -> Result<ResponseWatch>;

    /// Close the page and its browser context
    async fn close(&self) -> Result<()>;
}

/// A network response seen by the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub url: String,
    pub method: String,
    pub status: u16,
}

impl ObservedResponse {
    /// 2xx status
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Predicate selecting the response of interest
#[derive(Debug, Clone)]
pub struct ResponseMatcher {
    url: Regex,
    methods: Vec<String>,
}

impl ResponseMatcher {
    /// Match responses whose URL matches `url_pattern` (case-insensitive)
    /// and whose request used one of `methods`
    pub fn new(url_pattern: &str, methods: &[&str]) -> Result<Self> {
        let url = RegexBuilder::new(url_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Pattern {
                pattern: url_pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            url,
            methods: methods.iter().map(|m| m.to_ascii_uppercase()).collect(),
        })
    }

    pub fn matches(&self, response: &ObservedResponse) -> bool {
        self.url.is_match(&response.url)
            && (self.methods.is_empty()
                || self
                    .methods
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(&response.method)))
    }
}

/// Pending wait for a matching response
///
/// Resolves to `None` when the deadline passes or the page goes away;
/// not seeing a response is an ordinary outcome.
#[derive(Debug)]
pub struct ResponseWatch {
    rx: oneshot::Receiver<ObservedResponse>,
    deadline: Instant,
}

impl ResponseWatch {
    pub fn new(rx: oneshot::Receiver<ObservedResponse>, timeout: Duration) -> Self {
        Self {
            rx,
            deadline: Instant::now() + timeout,
        }
    }

    /// A watch that never observes anything
    pub fn never() -> Self {
        let (_tx, rx) = oneshot::channel();
        Self {
            rx,
            deadline: Instant::now(),
        }
    }

    pub async fn wait(self) -> Option<ObservedResponse> {
        match tokio::time::timeout_at(self.deadline, self.rx).await {
            Ok(Ok(response)) => Some(response),
            _ => None,
        }
    }
}
