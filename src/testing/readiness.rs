//! Requirement creation through the Readiness area
//!
//! Logs in with the configured account, reaches the Readiness overview
//! through the sidebar, creates a requirement from the Take Action menu and
//! confirms the write through the first success signal that shows up.
//! Controls are found through fallback chains since the markup differs
//! between builds of the application.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use super::classify::{classify, SuccessSignals};
use super::outcome::{Outcome, ScenarioFailure, Stage, StageExt};
use super::poller::{wait_resolve, wait_visible, SignalPattern, SignalPoller, READINESS_POLL_INTERVAL};
use super::runner::{Attempt, Scenario};
use crate::browser::{LocatorChain, Page, ResponseMatcher, ResponseWatch};
use crate::common::config::{Config, ENV_TEST_EMAIL, ENV_TEST_PASSWORD};
use crate::common::{Error, Result};

/// Suite file name in the report
pub const SUITE_FILE: &str = "readiness";

pub const DESCRIBE: &str = "Readiness | Create Requirement (navigate via sidebar)";

pub const SCENARIO_NAME: &str = "Login → Sidebar Readiness → Create Requirement";

/// Text put into the optional notes field
pub const NOTES_TEXT: &str = "Automated test note - safe to ignore.";

/// Toast text confirming the write
pub const SUCCESS_TOAST: &str = "(created|success|saved)";

pub const NO_SIGNAL_MESSAGE: &str = "No success signal after creating requirement (network/ toast/ list row)";

const SIDEBAR_TIMEOUT: Duration = Duration::from_millis(15_000);
const HEADING_TIMEOUT: Duration = Duration::from_millis(10_000);
const OVERLAY_TIMEOUT: Duration = Duration::from_millis(5_000);
const MENU_ITEM_TIMEOUT: Duration = Duration::from_millis(3_000);
const OPTION_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Controls of the Readiness area
pub mod selectors {
    use crate::browser::{Locator, LocatorChain};

    /// Accessible name of the create entry in the Take Action menu
    pub const CREATE_REQUIREMENT_ITEM: &str = r"^\s*(create|add)\s+requirement(s)?\s*$";

    const MENU_ITEM_ELEMENTS: &str = "[role='menuitem'], [role='option'], li, button, a, .dropdown-item, .menu-item";

    pub fn email_input() -> Locator {
        Locator::css("input[type='email'], input[name='email']")
    }

    pub fn password_input() -> Locator {
        Locator::css("input[type='password'], input[name='password']")
    }

    pub fn sign_in_button() -> Locator {
        Locator::role("button", "sign in")
    }

    pub fn sidebar_link() -> Locator {
        Locator::role("link", "readiness")
    }

    pub fn readiness_link() -> Locator {
        Locator::role("link", "^Readiness$")
    }

    pub fn overview_heading() -> Locator {
        Locator::role("heading", "Readiness Overview")
    }

    pub fn take_action() -> LocatorChain {
        Locator::role("button", "take action")
            .or(Locator::text("button", "Take Action"))
            .or(Locator::test_id("take-action"))
    }

    /// Container a popup menu renders into
    pub fn menu_overlay() -> Locator {
        Locator::css("[role='menu'], [role='listbox'], .cdk-overlay-pane, .MuiPopover-paper, .dropdown-menu")
    }

    pub fn create_requirement_item() -> LocatorChain {
        Locator::role("menuitem", CREATE_REQUIREMENT_ITEM)
            .or(Locator::text(MENU_ITEM_ELEMENTS, CREATE_REQUIREMENT_ITEM))
            .or(Locator::loose_text("requirement"))
    }

    pub fn create_heading() -> Locator {
        Locator::role("heading", "create requirement")
    }

    pub fn requirement_input() -> LocatorChain {
        Locator::placeholder("enter requirement")
            .or(Locator::label("requirement"))
            .or(Locator::test_id("requirement-input"))
    }

    pub fn speciality_trigger() -> LocatorChain {
        Locator::role("button", "select speciality")
            .or(Locator::label("speciality"))
            .or(Locator::test_id("speciality-trigger"))
    }

    pub fn status_trigger() -> LocatorChain {
        Locator::role("button", "^status$")
            .or(Locator::label("^status$"))
            .or(Locator::test_id("status-trigger"))
    }

    pub fn notes_input() -> LocatorChain {
        Locator::placeholder("write notes")
            .or(Locator::label("notes"))
            .or(Locator::test_id("notes-input"))
    }

    pub fn icon_trigger() -> LocatorChain {
        Locator::role("button", "select icon")
            .or(Locator::label("icon"))
            .or(Locator::test_id("icon-trigger"))
    }

    /// Any entry of an open dropdown
    pub fn dropdown_option() -> Locator {
        Locator::css("[role=\"option\"], [role=\"menuitem\"], .dropdown-item, .option, li, .mat-option")
    }

    pub fn submit_button() -> LocatorChain {
        Locator::role("button", "^submit$").or(Locator::text("button", "Submit"))
    }

    /// The created requirement as shown in the list
    pub fn list_row(name: &str) -> Locator {
        Locator::loose_text(regex::escape(name))
    }
}

/// Name given to the requirement created by one run
pub fn requirement_name() -> String {
    format!("Auto Req {}", Utc::now().timestamp_millis())
}

/// The requirement-creation scenario
#[derive(Debug, Clone, Default)]
pub struct ReadinessScenario;

impl ReadinessScenario {
    pub fn new() -> Self {
        Self
    }
}

pub fn suite() -> Vec<Box<dyn Scenario>> {
    vec![Box::new(ReadinessScenario::new())]
}

#[async_trait]
impl Scenario for ReadinessScenario {
    fn file(&self) -> &str {
        SUITE_FILE
    }

    fn describe(&self) -> &str {
        DESCRIBE
    }

    fn name(&self) -> String {
        SCENARIO_NAME.to_string()
    }

    fn skip_reason(&self, config: &Config) -> Option<String> {
        match config.credentials.pair() {
            Some(_) => None,
            None => Some(format!("{} and {} must be set", ENV_TEST_EMAIL, ENV_TEST_PASSWORD)),
        }
    }

    async fn run(&self, attempt: &mut Attempt<'_>) -> std::result::Result<(), ScenarioFailure> {
        let page = attempt.page();
        let config = attempt.config();
        let (email, password) = config
            .credentials
            .pair()
            .ok_or_else(|| Error::Skipped(format!("{} and {} must be set", ENV_TEST_EMAIL, ENV_TEST_PASSWORD)))
            .at(Stage::Arrive)?;

        attempt.enter(Stage::Arrive);
        login(page, config, email, password).await.at(Stage::Arrive)?;
        open_readiness(page).await.at(Stage::Arrive)?;

        attempt.enter(Stage::Act);
        open_create_requirement(page).await.at(Stage::Act)?;
        let name = requirement_name();
        fill_requirement_form(page, &name).await.at(Stage::Act)?;

        // The watch has to exist before the click that sends the request
        let matcher = ResponseMatcher::new("requirement", &["POST", "PUT"]).at(Stage::Act)?;
        let response = match page
            .watch_response(matcher, Duration::from_millis(config.timeouts.response_ms))
            .await
        {
            Ok(watch) => watch,
            Err(e) => {
                tracing::warn!(error = %e, "Response watch unavailable");
                ResponseWatch::never()
            }
        };
        selectors::submit_button().click(page).await.at(Stage::Act)?;

        attempt.enter(Stage::Classify);
        let signals = SuccessSignals {
            response,
            poller: SignalPoller::toasts(READINESS_POLL_INTERVAL),
            toast_pattern: SignalPattern::new(SUCCESS_TOAST).at(Stage::Classify)?,
            toast_timeout: Duration::from_millis(config.timeouts.readiness_toast_ms),
            list_row: selectors::list_row(&name),
        };
        let classification = classify(page, &config.readiness.signal_order, signals).await;

        attempt.enter(Stage::Assert);
        tracing::info!(
            requirement = %name,
            signal = ?classification.signal,
            outcome = %classification.outcome,
            "Requirement creation classified"
        );
        if classification.outcome != Outcome::Success {
            return Err(Error::NoSuccessSignal(NO_SIGNAL_MESSAGE.to_string())).at(Stage::Assert);
        }
        Ok(())
    }
}

async fn login(page: &dyn Page, config: &Config, email: &str, password: &str) -> Result<()> {
    page.navigate(&config.target.url("/login")).await?;
    page.fill(&selectors::email_input(), email).await?;
    page.fill(&selectors::password_input(), password).await?;
    page.click(&selectors::sign_in_button()).await?;

    if !wait_visible(page, &selectors::sidebar_link(), SIDEBAR_TIMEOUT, READINESS_POLL_INTERVAL).await {
        return Err(Error::navigation("Readiness sidebar link", SIDEBAR_TIMEOUT.as_millis() as u64));
    }
    tracing::debug!("Logged in");
    Ok(())
}

async fn open_readiness(page: &dyn Page) -> Result<()> {
    page.click(&selectors::readiness_link()).await?;
    if !wait_visible(page, &selectors::overview_heading(), HEADING_TIMEOUT, READINESS_POLL_INTERVAL).await {
        return Err(Error::navigation("Readiness Overview heading", HEADING_TIMEOUT.as_millis() as u64));
    }
    Ok(())
}

async fn open_create_requirement(page: &dyn Page) -> Result<()> {
    selectors::take_action().click(page).await?;

    // Inline menus never render an overlay
    if !wait_visible(page, &selectors::menu_overlay(), OVERLAY_TIMEOUT, READINESS_POLL_INTERVAL).await {
        tracing::debug!("No menu overlay, assuming an inline menu");
    }

    let items = selectors::create_requirement_item();
    let item = wait_resolve(page, &items, MENU_ITEM_TIMEOUT, READINESS_POLL_INTERVAL)
        .await
        .ok_or_else(|| Error::element_not_found(items.primary(), MENU_ITEM_TIMEOUT.as_millis() as u64))?;
    tracing::debug!(locator = %item, "Create Requirement entry resolved");
    page.click(&item).await?;

    if !wait_visible(page, &selectors::create_heading(), HEADING_TIMEOUT, READINESS_POLL_INTERVAL).await {
        return Err(Error::navigation("Create Requirement heading", HEADING_TIMEOUT.as_millis() as u64));
    }
    Ok(())
}

async fn fill_requirement_form(page: &dyn Page, name: &str) -> Result<()> {
    selectors::requirement_input().fill(page, name).await?;
    pick_first_option(page, &selectors::speciality_trigger()).await?;
    pick_first_option(page, &selectors::status_trigger()).await?;

    let notes = selectors::notes_input();
    if notes.is_visible(page).await {
        notes.fill(page, NOTES_TEXT).await?;
    }

    let icon = selectors::icon_trigger();
    if icon.is_visible(page).await {
        pick_first_option(page, &icon).await?;
    }
    Ok(())
}

/// Open a dropdown and pick its first visible entry
async fn pick_first_option(page: &dyn Page, trigger: &LocatorChain) -> Result<()> {
    trigger.click(page).await?;
    let option = selectors::dropdown_option();
    if !wait_visible(page, &option, OPTION_TIMEOUT, READINESS_POLL_INTERVAL).await {
        return Err(Error::element_not_found(&option, OPTION_TIMEOUT.as_millis() as u64));
    }
    page.click(&option).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::Credentials;

    #[test]
    fn test_skipped_without_credentials() {
        let mut config = Config::default();
        assert!(ReadinessScenario::new().skip_reason(&config).is_some());

        config.credentials = Credentials {
            email: Some("qa@x.com".into()),
            password: Some("pw".into()),
        };
        assert!(ReadinessScenario::new().skip_reason(&config).is_none());
    }

    #[test]
    fn test_requirement_name_is_unique_per_millisecond() {
        let name = requirement_name();
        assert!(name.starts_with("Auto Req "));
        assert!(name["Auto Req ".len()..].parse::<i64>().is_ok());
    }

    #[test]
    fn test_create_item_pattern() {
        let pattern = SignalPattern::new(selectors::CREATE_REQUIREMENT_ITEM).unwrap();
        assert!(pattern.is_match(" Create Requirement "));
        assert!(pattern.is_match("add requirements"));
        assert!(!pattern.is_match("Create Requirement Group"));
    }
}
