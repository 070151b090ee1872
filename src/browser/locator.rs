//! Element locators and fallback chains
//!
//! A [`Locator`] describes how to find elements; it carries no element
//! handles, so the same value can be re-evaluated on every poll. Text and
//! name patterns are regular expressions matched case-insensitively.

use std::fmt;

use super::Page;
use crate::common::Result;

/// One strategy for finding elements on a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// CSS selector (a selector list matches the union)
    Css(String),
    /// ARIA role with an accessible name matching `name`
    Role { role: String, name: String },
    /// Elements matching `selector` whose text matches `pattern`
    Text { selector: String, pattern: String },
    /// Any element whose own text matches `pattern`
    LooseText(String),
    /// Form control whose placeholder matches the pattern
    Placeholder(String),
    /// Form control whose label matches the pattern
    Label(String),
    /// `[data-testid="..."]`
    TestId(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn text(selector: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Text {
            selector: selector.into(),
            pattern: pattern.into(),
        }
    }

    pub fn loose_text(pattern: impl Into<String>) -> Self {
        Self::LooseText(pattern.into())
    }

    pub fn placeholder(pattern: impl Into<String>) -> Self {
        Self::Placeholder(pattern.into())
    }

    pub fn label(pattern: impl Into<String>) -> Self {
        Self::Label(pattern.into())
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Start a fallback chain with this locator as the preferred strategy
    pub fn or(self, next: Locator) -> LocatorChain {
        LocatorChain::new(self).or(next)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css={}", selector),
            Locator::Role { role, name } => write!(f, "role={}[name=/{}/i]", role, name),
            Locator::Text { selector, pattern } => {
                write!(f, "{} >> text=/{}/i", selector, pattern)
            }
            Locator::LooseText(pattern) => write!(f, "text=/{}/i", pattern),
            Locator::Placeholder(pattern) => write!(f, "placeholder=/{}/i", pattern),
            Locator::Label(pattern) => write!(f, "label=/{}/i", pattern),
            Locator::TestId(id) => write!(f, "data-testid={}", id),
        }
    }
}

/// Ordered list of locator strategies, evaluated left to right
///
/// The first strategy that currently has a visible match wins. Lookup
/// errors on one strategy count as "no match" and fall through to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorChain {
    strategies: Vec<Locator>,
}

impl LocatorChain {
    pub fn new(first: Locator) -> Self {
        Self {
            strategies: vec![first],
        }
    }

    /// Append a lower-priority fallback strategy
    pub fn or(mut self, next: Locator) -> Self {
        self.strategies.push(next);
        self
    }

    pub fn strategies(&self) -> &[Locator] {
        &self.strategies
    }

    /// The preferred strategy, used when nothing is visible yet
    pub fn primary(&self) -> &Locator {
        &self.strategies[0]
    }

    /// First strategy with a visible match, if any
    pub async fn resolve(&self, page: &dyn Page) -> Option<&Locator> {
        for locator in &self.strategies {
            match page.is_visible(locator).await {
                Ok(true) => return Some(locator),
                Ok(false) => {}
                Err(e) => tracing::debug!(%locator, error = %e, "Locator strategy failed"),
            }
        }
        None
    }

    /// Whether any strategy has a visible match
    pub async fn is_visible(&self, page: &dyn Page) -> bool {
        self.resolve(page).await.is_some()
    }

    /// Click the first visible strategy, or the primary one if none is visible
    pub async fn click(&self, page: &dyn Page) -> Result<()> {
        let target = self.resolve(page).await.unwrap_or_else(|| self.primary());
        page.click(target).await
    }

    /// Fill the first visible strategy, or the primary one if none is visible
    pub async fn fill(&self, page: &dyn Page, value: &str) -> Result<()> {
        let target = self.resolve(page).await.unwrap_or_else(|| self.primary());
        page.fill(target, value).await
    }
}

impl From<Locator> for LocatorChain {
    fn from(locator: Locator) -> Self {
        Self::new(locator)
    }
}

impl fmt::Display for LocatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.strategies.iter().map(|l| l.to_string()).collect();
        write!(f, "{}", parts.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(
            Locator::role("button", "sign in").to_string(),
            "role=button[name=/sign in/i]"
        );
        assert_eq!(
            Locator::text("button", "Sign in").to_string(),
            "button >> text=/Sign in/i"
        );
        assert_eq!(Locator::test_id("take-action").to_string(), "data-testid=take-action");
    }

    #[test]
    fn test_chain_keeps_order() {
        let chain = Locator::role("button", "take action")
            .or(Locator::text("button", "Take Action"))
            .or(Locator::test_id("take-action"));

        assert_eq!(chain.strategies().len(), 3);
        assert_eq!(chain.primary(), &Locator::role("button", "take action"));
        assert_eq!(chain.strategies()[2], Locator::test_id("take-action"));
    }
}
