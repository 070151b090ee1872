//! Scenario executor
//!
//! Runs scenarios against a [`BrowserEngine`], one isolated page per
//! attempt, and turns whatever happens (pass, failure, skip, timeout)
//! into exactly one [`OutcomeRecord`]. Nothing a single scenario does can
//! abort its siblings.

use async_trait::async_trait;
use chrono::Utc;
use colored::Colorize;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::Instrument;

use super::evidence::{self, EvidenceStore};
use super::outcome::{OutcomeRecord, ScenarioFailure, Stage, TestStatus};
use super::recorder::ResultRecorder;
use crate::browser::{BrowserEngine, Page};
use crate::common::config::Config;
use crate::common::Error;

/// File name of the screenshot taken when a scenario fails without one
pub const FAILURE_SCREENSHOT: &str = "failure.png";

/// One runnable scenario
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Suite file the scenario belongs to
    fn file(&self) -> &str;

    /// Title of the enclosing group
    fn describe(&self) -> &str;

    /// Short test name
    fn name(&self) -> String;

    /// Reason not to run at all under `config`
    fn skip_reason(&self, _config: &Config) -> Option<String> {
        None
    }

    async fn run(&self, attempt: &mut Attempt<'_>) -> Result<(), ScenarioFailure>;
}

/// State of one attempt, handed to [`Scenario::run`]
pub struct Attempt<'a> {
    page: &'a dyn Page,
    config: &'a Config,
    evidence_dir: PathBuf,
    stage: Stage,
    screenshot: Option<PathBuf>,
}

impl<'a> Attempt<'a> {
    pub fn new(page: &'a dyn Page, config: &'a Config, evidence_dir: PathBuf) -> Self {
        Self {
            page,
            config,
            evidence_dir,
            stage: Stage::Arrive,
            screenshot: None,
        }
    }

    pub fn page(&self) -> &'a dyn Page {
        self.page
    }

    pub fn config(&self) -> &'a Config {
        self.config
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Mark the start of a stage; a timeout is attributed to the last one entered
    pub fn enter(&mut self, stage: Stage) {
        tracing::debug!(%stage, "Entering stage");
        self.stage = stage;
    }

    pub fn screenshot(&self) -> Option<&PathBuf> {
        self.screenshot.as_ref()
    }

    /// Screenshot into the evidence directory; failures are logged only
    pub async fn attach_screenshot(&mut self, name: &str) -> Option<PathBuf> {
        match evidence::save_screenshot(self.page, &self.evidence_dir, name).await {
            Ok(path) => {
                self.screenshot = Some(path.clone());
                Some(path)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Screenshot not captured");
                None
            }
        }
    }

    /// JSON attachment in the evidence directory; failures are logged only
    pub fn attach_json<T: Serialize>(&self, name: &str, value: &T) -> Option<PathBuf> {
        evidence::save_json(&self.evidence_dir, name, value)
            .map_err(|e| tracing::warn!(error = %e, "Attachment not saved"))
            .ok()
    }
}

/// Counts of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timed_out: usize,
}

impl RunSummary {
    pub fn from_records(records: &[OutcomeRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Skipped => summary.skipped += 1,
                TestStatus::TimedOut => summary.timed_out += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.timed_out
    }

    /// Whether the run should exit non-zero
    pub fn has_failures(&self) -> bool {
        self.failed + self.timed_out > 0
    }
}

/// Executes suites and feeds the recorder
pub struct Runner<'a> {
    engine: &'a dyn BrowserEngine,
    config: &'a Config,
    recorder: &'a ResultRecorder,
    evidence: EvidenceStore,
}

impl<'a> Runner<'a> {
    pub fn new(engine: &'a dyn BrowserEngine, config: &'a Config, recorder: &'a ResultRecorder) -> Self {
        Self {
            engine,
            config,
            recorder,
            evidence: EvidenceStore::new(config.output.evidence_dir.clone()),
        }
    }

    /// Run every scenario, at most `workers` at a time, recording each
    /// outcome under its declaration position
    pub async fn run_suite(&self, scenarios: &[Box<dyn Scenario>]) {
        let base = self.recorder.reserve(scenarios.len());
        let workers = self.config.run.workers.max(1);

        stream::iter(scenarios.iter().enumerate())
            .map(|(index, scenario)| async move {
                let record = self.execute(scenario.as_ref()).await;
                print_result(&record);
                self.recorder.record(base + index, record);
            })
            .buffer_unordered(workers)
            .collect::<Vec<()>>()
            .await;
    }

    /// Run one scenario with retries and return its final record
    pub async fn execute(&self, scenario: &dyn Scenario) -> OutcomeRecord {
        let title = format!(
            "{} > {} > {} > {}",
            self.engine.project(),
            scenario.file(),
            scenario.describe(),
            scenario.name()
        );

        if let Some(reason) = scenario.skip_reason(self.config) {
            tracing::info!(test_case = %scenario.name(), %reason, status = "skipped", "Scenario skipped");
            return self.record(scenario, &title, 0, Utc::now(), 0, TestStatus::Skipped, None, None);
        }

        let mut retry = 0;
        loop {
            let span = tracing::info_span!("scenario", test_case = %scenario.name(), retry);
            let record = self.attempt(scenario, &title, retry).instrument(span).await;
            if !record.status.is_failure() || retry >= self.config.run.retries {
                return record;
            }
            tracing::info!(test_case = %record.name, retry = retry + 1, "Retrying scenario");
            retry += 1;
        }
    }

    async fn attempt(&self, scenario: &dyn Scenario, title: &str, retry: u32) -> OutcomeRecord {
        let start_time = Utc::now();
        let clock = Instant::now();

        let page = match self.engine.open_page().await {
            Ok(page) => page,
            Err(e) => {
                let failure = ScenarioFailure::new(Stage::Arrive, e);
                tracing::error!(status = "failed", error = %failure, "Could not open page");
                let duration = clock.elapsed().as_millis() as u64;
                return self.record(scenario, title, retry, start_time, duration, TestStatus::Failed, Some(failure), None);
            }
        };

        let mut attempt = Attempt::new(page.as_ref(), self.config, self.evidence.scenario_dir(title, retry));
        let limit = self.config.timeouts.scenario();
        let (status, failure) = match tokio::time::timeout(limit, scenario.run(&mut attempt)).await {
            Ok(Ok(())) => (TestStatus::Passed, None),
            Ok(Err(failure)) if matches!(failure.error, Error::Skipped(_)) => (TestStatus::Skipped, None),
            Ok(Err(failure)) => (TestStatus::Failed, Some(failure)),
            Err(_) => (
                TestStatus::TimedOut,
                Some(ScenarioFailure::new(
                    attempt.stage(),
                    Error::ScenarioTimeout(self.config.timeouts.scenario_ms),
                )),
            ),
        };

        if status.is_failure() && attempt.screenshot().is_none() {
            attempt.attach_screenshot(FAILURE_SCREENSHOT).await;
        }
        // Only failed attempts put a screenshot in the report
        let screenshot = if status.is_failure() {
            attempt.screenshot().cloned()
        } else {
            None
        };

        if let Err(e) = page.close().await {
            tracing::warn!(error = %e, "Page did not close cleanly");
        }

        match &failure {
            Some(failure) => tracing::info!(status = %status, error = %failure, "Scenario finished"),
            None => tracing::info!(status = %status, "Scenario finished"),
        }

        let duration = clock.elapsed().as_millis() as u64;
        self.record(scenario, title, retry, start_time, duration, status, failure, screenshot)
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        scenario: &dyn Scenario,
        title: &str,
        retry: u32,
        start_time: chrono::DateTime<Utc>,
        duration_ms: u64,
        status: TestStatus,
        failure: Option<ScenarioFailure>,
        screenshot: Option<PathBuf>,
    ) -> OutcomeRecord {
        OutcomeRecord {
            file: scenario.file().to_string(),
            title: title.to_string(),
            name: scenario.name(),
            status,
            duration_ms,
            project: self.engine.project().to_string(),
            retry_count: retry,
            error_message: failure.as_ref().map(|f| f.error.to_string()),
            error_trace: failure.as_ref().map(ScenarioFailure::trace),
            screenshot,
            video: None,
            start_time,
        }
    }
}

/// One line of the list reporter
fn print_result(record: &OutcomeRecord) {
    let mark = match record.status {
        TestStatus::Passed => "✓".green(),
        TestStatus::Failed => "✗".red(),
        TestStatus::TimedOut => "✘".red(),
        TestStatus::Skipped => "-".yellow(),
    };
    let retry = if record.retry_count > 0 {
        format!(" (retry #{})", record.retry_count)
    } else {
        String::new()
    };
    println!(
        "  {} {}{} {}",
        mark,
        record.title,
        retry.yellow(),
        format!("({}ms)", record.duration_ms).dimmed()
    );
    if let Some(message) = &record.error_message {
        println!("      {}", message.red());
    }
}

/// Print the end-of-run summary
pub fn print_summary(summary: &RunSummary) {
    println!();
    if summary.passed > 0 {
        println!("  {} {}", summary.passed.to_string().green().bold(), "passed".green());
    }
    if summary.failed > 0 {
        println!("  {} {}", summary.failed.to_string().red().bold(), "failed".red());
    }
    if summary.timed_out > 0 {
        println!("  {} {}", summary.timed_out.to_string().red().bold(), "timed out".red());
    }
    if summary.skipped > 0 {
        println!("  {} {}", summary.skipped.to_string().yellow().bold(), "skipped".yellow());
    }
    if summary.total() == 0 {
        println!("  {}", "No scenarios were run".dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::{MockAction, MockEngine, MockPage};
    use crate::browser::Locator;
    use crate::testing::outcome::StageExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Scenario with a scripted body
    struct Scripted {
        name: &'static str,
        failures_before_pass: u32,
        calls: AtomicU32,
        hang: bool,
    }

    impl Scripted {
        fn passing(name: &'static str) -> Self {
            Self::flaky(name, 0)
        }

        fn flaky(name: &'static str, failures_before_pass: u32) -> Self {
            Self {
                name,
                failures_before_pass,
                calls: AtomicU32::new(0),
                hang: false,
            }
        }
    }

    #[async_trait]
    impl Scenario for Scripted {
        fn file(&self) -> &str {
            "unit"
        }

        fn describe(&self) -> &str {
            "Runner"
        }

        fn name(&self) -> String {
            self.name.to_string()
        }

        async fn run(&self, attempt: &mut Attempt<'_>) -> Result<(), ScenarioFailure> {
            attempt.enter(Stage::Act);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_pass {
                return attempt
                    .page()
                    .click(&Locator::css("#missing"))
                    .await
                    .at(Stage::Act);
            }
            Ok(())
        }
    }

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.output.evidence_dir = dir.join("evidence");
        config
    }

    #[tokio::test]
    async fn test_failure_is_recorded_with_stage_and_screenshot() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let engine = MockEngine::new("Chromium", MockPage::new);
        let recorder = ResultRecorder::new();
        let runner = Runner::new(&engine, &config, &recorder);

        let record = runner.execute(&Scripted::flaky("always", u32::MAX)).await;

        assert_eq!(record.status, TestStatus::Failed);
        assert_eq!(record.title, "Chromium > unit > Runner > always");
        assert!(record.error_trace.unwrap().contains("at stage act"));
        let shot = record.screenshot.unwrap();
        assert!(shot.ends_with(FAILURE_SCREENSHOT));
        assert!(shot.exists());
        assert!(engine.pages()[0].is_closed());
    }

    #[tokio::test]
    async fn test_retries_record_final_attempt() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.run.retries = 2;
        let engine = MockEngine::new("Chromium", MockPage::new);
        let recorder = ResultRecorder::new();
        let runner = Runner::new(&engine, &config, &recorder);

        let record = runner.execute(&Scripted::flaky("flaky", 1)).await;

        assert_eq!(record.status, TestStatus::Passed);
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.error_message, None);
        assert_eq!(engine.pages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let engine = MockEngine::new("Chromium", MockPage::new);
        let recorder = ResultRecorder::new();
        let runner = Runner::new(&engine, &config, &recorder);

        let mut hanging = Scripted::passing("hangs");
        hanging.hang = true;
        let record = runner.execute(&hanging).await;

        assert_eq!(record.status, TestStatus::TimedOut);
        assert!(record.duration_ms >= 30_000);
        assert_eq!(record.error_message.as_deref(), Some("Scenario timed out after 30000ms"));
        let page = &engine.pages()[0];
        assert!(page.is_closed());
        assert!(page.actions().contains(&MockAction::Screenshot));
    }

    #[tokio::test]
    async fn test_suite_keeps_declaration_order_with_workers() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.run.workers = 3;
        let engine = MockEngine::new("Chromium", MockPage::new);
        let recorder = ResultRecorder::new();
        let runner = Runner::new(&engine, &config, &recorder);

        let scenarios: Vec<Box<dyn Scenario>> = vec![
            Box::new(Scripted::passing("one")),
            Box::new(Scripted::flaky("two", u32::MAX)),
            Box::new(Scripted::passing("three")),
        ];
        runner.run_suite(&scenarios).await;

        let records = recorder.records();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two", "three"]);

        let summary = RunSummary::from_records(&records);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_skipped_and_passed_runs_exit_zero() {
        let record = |status| OutcomeRecord {
            file: "readiness".to_string(),
            title: "Chromium > readiness > create".to_string(),
            name: "create".to_string(),
            status,
            duration_ms: 0,
            project: "Chromium".to_string(),
            retry_count: 0,
            error_message: None,
            error_trace: None,
            screenshot: None,
            video: None,
            start_time: Utc::now(),
        };

        let summary = RunSummary::from_records(&[record(TestStatus::Passed), record(TestStatus::Skipped)]);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.has_failures());

        let summary = RunSummary::from_records(&[record(TestStatus::Skipped), record(TestStatus::TimedOut)]);
        assert!(summary.has_failures());
    }
}
