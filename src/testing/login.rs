//! Data-driven login suite
//!
//! One scenario per fixture row: open the login page, submit the row's
//! credentials, decide from the toast whether the login went through and
//! compare that with the row's expectation.

use async_trait::async_trait;
use std::time::Duration;

use super::fixture::TestCaseRecord;
use super::outcome::{Outcome, ScenarioFailure, Stage, StageExt};
use super::poller::{wait_visible, SignalPattern, SignalPoller, LOGIN_POLL_INTERVAL};
use super::runner::{Attempt, Scenario};
use crate::common::Error;

/// Suite file name in the report
pub const SUITE_FILE: &str = "login";

/// Enclosing group of every login scenario
pub const DESCRIBE: &str = "Login Tests";

/// Toast text shown after a successful login
pub const SUCCESS_TOAST: &str = "User Logged in Successfully";

/// Evidence file with the submitted inputs
pub const INPUTS_FILE: &str = "inputs.json";

/// Evidence file with the final page
pub const PAGE_FILE: &str = "page.png";

/// Controls of the login page
pub mod selectors {
    use crate::browser::Locator;

    pub fn sign_in_button() -> Locator {
        Locator::role("button", "sign in")
    }

    pub fn submit_button() -> Locator {
        Locator::text("button", "Sign in")
    }

    pub fn email_input() -> Locator {
        Locator::css("input[type='email']")
    }

    pub fn password_input() -> Locator {
        Locator::css("input[type='password']")
    }
}

/// The login scenario of one fixture row
#[derive(Debug, Clone)]
pub struct LoginScenario {
    record: TestCaseRecord,
}

impl LoginScenario {
    pub fn new(record: TestCaseRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &TestCaseRecord {
        &self.record
    }
}

/// One scenario per record, in fixture order
pub fn suite(records: Vec<TestCaseRecord>) -> Vec<Box<dyn Scenario>> {
    records
        .into_iter()
        .map(|record| Box::new(LoginScenario::new(record)) as Box<dyn Scenario>)
        .collect()
}

#[async_trait]
impl Scenario for LoginScenario {
    fn file(&self) -> &str {
        SUITE_FILE
    }

    fn describe(&self) -> &str {
        DESCRIBE
    }

    fn name(&self) -> String {
        format!(
            "Login • {} • {} • expect={}",
            self.record.test_case_id, self.record.email, self.record.expected_result
        )
    }

    async fn run(&self, attempt: &mut Attempt<'_>) -> Result<(), ScenarioFailure> {
        let page = attempt.page();
        let config = attempt.config();
        let record = &self.record;

        attempt.enter(Stage::Arrive);
        page.navigate(&config.target.url("/login"))
            .await
            .at(Stage::Arrive)?;
        if !wait_visible(page, &selectors::sign_in_button(), config.timeouts.expect(), LOGIN_POLL_INTERVAL).await {
            return Err(Error::navigation("Sign in button", config.timeouts.expect_ms)).at(Stage::Arrive);
        }

        attempt.enter(Stage::Act);
        page.fill(&selectors::email_input(), &record.email)
            .await
            .at(Stage::Act)?;
        page.fill(&selectors::password_input(), &record.password)
            .await
            .at(Stage::Act)?;
        page.click(&selectors::submit_button()).await.at(Stage::Act)?;

        attempt.enter(Stage::Classify);
        let pattern = SignalPattern::new(&regex::escape(SUCCESS_TOAST)).at(Stage::Classify)?;
        let seen = SignalPoller::toasts(LOGIN_POLL_INTERVAL)
            .await_signal(page, &pattern, Duration::from_millis(config.timeouts.login_toast_ms))
            .await;
        let actual = Outcome::from(seen);

        attempt.enter(Stage::Evidence);
        attempt.attach_json(INPUTS_FILE, record);
        attempt.attach_screenshot(PAGE_FILE).await;

        attempt.enter(Stage::Assert);
        tracing::info!(
            test_case = %record.test_case_id,
            expected = %record.expected_result,
            actual = %actual,
            "Login classified"
        );
        if actual != record.expected_result {
            return Err(Error::mismatch("Login outcome mismatch", record.expected_result, actual))
                .at(Stage::Assert);
        }
        Ok(())
    }
}
