//! Scripted in-memory page
//!
//! Elements are registered under the exact [`Locator`] the suites query and
//! appear/vanish on a timeline driven by `tokio::time`, so tests can run
//! with paused time. Reactions model the application: clicking a locator
//! (optionally only when a field holds a given value) spawns new elements
//! and/or answers pending response watches.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::{BrowserEngine, Locator, ObservedResponse, Page, ResponseMatcher, ResponseWatch};
use crate::common::{Error, Result};

/// Minimal PNG signature returned by screenshots
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// An element on the scripted timeline
#[derive(Debug, Clone)]
pub struct MockElement {
    text: String,
    visible: bool,
    appear_after: Duration,
    vanish_after: Option<Duration>,
    unreadable: bool,
}

impl MockElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visible: true,
            appear_after: Duration::ZERO,
            vanish_after: None,
            unreadable: false,
        }
    }

    /// Present in the DOM but not visible
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Appear `delay` after being placed
    pub fn after(mut self, delay: Duration) -> Self {
        self.appear_after = delay;
        self
    }

    /// Disappear `lifetime` after being placed
    pub fn vanishes_after(mut self, lifetime: Duration) -> Self {
        self.vanish_after = Some(lifetime);
        self
    }

    /// Reading its text fails, as for a node detached mid-enumeration
    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }
}

#[derive(Debug, Clone)]
struct Placed {
    element: MockElement,
    from: Instant,
    until: Option<Instant>,
}

impl Placed {
    fn new(element: MockElement, now: Instant) -> Self {
        Self {
            from: now + element.appear_after,
            until: element.vanish_after.map(|d| now + d),
            element,
        }
    }

    fn present(&self, now: Instant) -> bool {
        now >= self.from && self.until.map_or(true, |until| now < until)
    }
}

/// Something the page was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
    Navigate(String),
    Fill(Locator, String),
    Click(Locator),
    Screenshot,
    Close,
}

/// Application behaviour triggered by a click
#[derive(Clone)]
pub struct Reaction {
    trigger: Locator,
    when_filled: Option<(Locator, String)>,
    spawn: Vec<(Locator, MockElement)>,
    echo: Option<(Locator, fn(&str) -> Locator)>,
    respond: Option<(ObservedResponse, Duration)>,
}

impl Reaction {
    pub fn on_click(trigger: Locator) -> Self {
        Self {
            trigger,
            when_filled: None,
            spawn: Vec::new(),
            echo: None,
            respond: None,
        }
    }

    /// Only fire when `field` was last filled with `value`
    pub fn when_filled(mut self, field: Locator, value: impl Into<String>) -> Self {
        self.when_filled = Some((field, value.into()));
        self
    }

    /// Place an element when fired
    pub fn spawn(mut self, locator: Locator, element: MockElement) -> Self {
        self.spawn.push((locator, element));
        self
    }

    /// Show the value last filled into `field` under `locate(value)`
    pub fn echo(mut self, field: Locator, locate: fn(&str) -> Locator) -> Self {
        self.echo = Some((field, locate));
        self
    }

    /// Answer matching response watches `delay` after firing
    pub fn respond(mut self, response: ObservedResponse, delay: Duration) -> Self {
        self.respond = Some((response, delay));
        self
    }
}

struct MockState {
    elements: HashMap<Locator, Vec<Placed>>,
    filled: HashMap<Locator, String>,
    reactions: Vec<Reaction>,
    actions: Vec<MockAction>,
    watchers: Vec<(ResponseMatcher, oneshot::Sender<ObservedResponse>)>,
    screenshots_fail: bool,
    closed: bool,
    reads: usize,
}

/// Scripted page; clones share state
#[derive(Clone)]
pub struct MockPage {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                elements: HashMap::new(),
                filled: HashMap::new(),
                reactions: Vec::new(),
                actions: Vec::new(),
                watchers: Vec::new(),
                screenshots_fail: false,
                closed: false,
                reads: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from later asserts
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Place an element now (its own delay still applies)
    pub fn place(&self, locator: Locator, element: MockElement) -> &Self {
        let now = Instant::now();
        self.lock()
            .elements
            .entry(locator)
            .or_default()
            .push(Placed::new(element, now));
        self
    }

    /// Place an empty, visible form control
    pub fn with_input(&self, locator: Locator) -> &Self {
        self.place(locator, MockElement::new(""))
    }

    /// Register application behaviour
    pub fn react(&self, reaction: Reaction) -> &Self {
        self.lock().reactions.push(reaction);
        self
    }

    /// Make every screenshot fail
    pub fn fail_screenshots(&self) -> &Self {
        self.lock().screenshots_fail = true;
        self
    }

    /// Everything the page was asked to do, in order
    pub fn actions(&self) -> Vec<MockAction> {
        self.lock().actions.clone()
    }

    /// Last value filled into `locator`
    pub fn filled(&self, locator: &Locator) -> Option<String> {
        self.lock().filled.get(locator).cloned()
    }

    /// Number of count/text/visibility queries answered
    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn present<'a>(state: &'a MockState, locator: &Locator, now: Instant) -> Vec<&'a Placed> {
        state
            .elements
            .get(locator)
            .map(|list| list.iter().filter(|p| p.present(now)).collect())
            .unwrap_or_default()
    }

    fn require_visible(state: &MockState, locator: &Locator) -> Result<()> {
        let now = Instant::now();
        if Self::present(state, locator, now)
            .iter()
            .any(|p| p.element.visible)
        {
            Ok(())
        } else {
            Err(Error::Browser(format!("no visible element for {}", locator)))
        }
    }

    fn fire(&self, state: &mut MockState, trigger: &Locator) {
        let now = Instant::now();
        let fired: Vec<Reaction> = state
            .reactions
            .iter()
            .filter(|r| &r.trigger == trigger)
            .filter(|r| match &r.when_filled {
                Some((field, value)) => state.filled.get(field) == Some(value),
                None => true,
            })
            .cloned()
            .collect();

        for reaction in fired {
            for (locator, element) in reaction.spawn {
                state
                    .elements
                    .entry(locator)
                    .or_default()
                    .push(Placed::new(element, now));
            }
            if let Some((field, locate)) = reaction.echo {
                if let Some(value) = state.filled.get(&field).cloned() {
                    state
                        .elements
                        .entry(locate(&value))
                        .or_default()
                        .push(Placed::new(MockElement::new(value), now));
                }
            }
            if let Some((response, delay)) = reaction.respond {
                let page = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    page.deliver(response);
                });
            }
        }
    }

    /// Answer every pending watch that matches `response`
    pub fn deliver(&self, response: ObservedResponse) {
        let mut state = self.lock();
        let watchers = std::mem::take(&mut state.watchers);
        for (matcher, tx) in watchers {
            if matcher.matches(&response) {
                let _ = tx.send(response.clone());
            } else {
                state.watchers.push((matcher, tx));
            }
        }
    }
}

#[async_trait]
impl Page for MockPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.lock().actions.push(MockAction::Navigate(url.to_string()));
        Ok(())
    }

    async fn fill(&self, target: &Locator, value: &str) -> Result<()> {
        let mut state = self.lock();
        Self::require_visible(&state, target)?;
        state
            .actions
            .push(MockAction::Fill(target.clone(), value.to_string()));
        state.filled.insert(target.clone(), value.to_string());
        Ok(())
    }

    async fn click(&self, target: &Locator) -> Result<()> {
        let mut state = self.lock();
        Self::require_visible(&state, target)?;
        state.actions.push(MockAction::Click(target.clone()));
        self.fire(&mut state, target);
        Ok(())
    }

    async fn count(&self, target: &Locator) -> Result<usize> {
        let mut state = self.lock();
        state.reads += 1;
        Ok(Self::present(&state, target, Instant::now()).len())
    }

    async fn text_of(&self, target: &Locator, index: usize) -> Result<Option<String>> {
        let mut state = self.lock();
        state.reads += 1;
        match Self::present(&state, target, Instant::now()).get(index) {
            Some(placed) if placed.element.unreadable => {
                Err(Error::Browser(format!("element {} of {} detached", index, target)))
            }
            Some(placed) => Ok(Some(placed.element.text.clone())),
            None => Ok(None),
        }
    }

    async fn is_visible(&self, target: &Locator) -> Result<bool> {
        let mut state = self.lock();
        state.reads += 1;
        Ok(Self::present(&state, target, Instant::now())
            .first()
            .is_some_and(|p| p.element.visible))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let mut state = self.lock();
        state.actions.push(MockAction::Screenshot);
        if state.screenshots_fail {
            return Err(Error::Browser("screenshot target closed".to_string()));
        }
        Ok(FAKE_PNG.to_vec())
    }

    async fn watch_response(
        &self,
        matcher: ResponseMatcher,
        timeout: Duration,
    ) -> Result<ResponseWatch> {
        let (tx, rx) = oneshot::channel();
        self.lock().watchers.push((matcher, tx));
        Ok(ResponseWatch::new(rx, timeout))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.lock();
        state.actions.push(MockAction::Close);
        state.closed = true;
        Ok(())
    }
}

/// Engine handing out a freshly scripted page per context
pub struct MockEngine {
    project: String,
    factory: Box<dyn Fn() -> MockPage + Send + Sync>,
    opened: Mutex<Vec<MockPage>>,
}

impl MockEngine {
    pub fn new<F>(project: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> MockPage + Send + Sync + 'static,
    {
        Self {
            project: project.into(),
            factory: Box::new(factory),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Every page opened so far, in opening order
    pub fn pages(&self) -> Vec<MockPage> {
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    fn project(&self) -> &str {
        &self.project
    }

    async fn open_page(&self) -> Result<Box<dyn Page>> {
        let page = (self.factory)();
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(page.clone());
        Ok(Box::new(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeline_visibility() {
        let page = MockPage::new();
        let toast = Locator::css(".toast");
        page.place(
            toast.clone(),
            MockElement::new("Saved")
                .after(Duration::from_millis(200))
                .vanishes_after(Duration::from_millis(400)),
        );

        assert_eq!(page.count(&toast).await.unwrap(), 0);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(page.is_visible(&toast).await.unwrap());
        assert_eq!(page.text_of(&toast, 0).await.unwrap().as_deref(), Some("Saved"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(page.count(&toast).await.unwrap(), 0);
        assert_eq!(page.text_of(&toast, 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reaction_conditioned_on_fill() {
        let page = MockPage::new();
        let email = Locator::css("input[type='email']");
        let submit = Locator::css("button");
        let toast = Locator::css(".toast");
        page.with_input(email.clone())
            .with_input(submit.clone())
            .react(
                Reaction::on_click(submit.clone())
                    .when_filled(email.clone(), "good@x.com")
                    .spawn(toast.clone(), MockElement::new("Welcome")),
            );

        page.fill(&email, "bad@x.com").await.unwrap();
        page.click(&submit).await.unwrap();
        assert_eq!(page.count(&toast).await.unwrap(), 0);

        page.fill(&email, "good@x.com").await.unwrap();
        page.click(&submit).await.unwrap();
        assert_eq!(page.count(&toast).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_echo_shows_filled_value() {
        let page = MockPage::new();
        let name = Locator::placeholder("enter requirement");
        let submit = Locator::role("button", "^submit$");
        page.with_input(name.clone())
            .with_input(submit.clone())
            .react(Reaction::on_click(submit.clone()).echo(name.clone(), |value| Locator::loose_text(value)));

        page.fill(&name, "Auto Req 42").await.unwrap();
        page.click(&submit).await.unwrap();
        assert!(page.is_visible(&Locator::loose_text("Auto Req 42")).await.unwrap());
    }

    #[tokio::test]
    async fn test_click_requires_visible_element() {
        let page = MockPage::new();
        let hidden = Locator::css("#menu");
        page.place(hidden.clone(), MockElement::new("Menu").hidden());
        assert!(page.click(&hidden).await.is_err());
        assert!(page.click(&Locator::css("#missing")).await.is_err());
    }
}
