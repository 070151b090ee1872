//! Scenario outcome types

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::common::Error;

/// Binary result of a workflow, both expected (fixture) and observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "Success"),
            Outcome::Failure => write!(f, "Failure"),
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Outcome::Success),
            "failure" => Ok(Outcome::Failure),
            other => Err(format!(
                "expected 'Success' or 'Failure', got '{}'",
                other
            )),
        }
    }
}

impl From<bool> for Outcome {
    fn from(observed: bool) -> Self {
        if observed {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

/// Final status of one scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    TimedOut,
}

impl TestStatus {
    /// Report spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::TimedOut => "timedOut",
        }
    }

    /// Whether this status makes the run fail
    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::TimedOut)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(TestStatus::Passed),
            "failed" => Ok(TestStatus::Failed),
            "skipped" => Ok(TestStatus::Skipped),
            "timedOut" => Ok(TestStatus::TimedOut),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Stage of a scenario, used to attribute failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Arrive,
    Act,
    Classify,
    Assert,
    Evidence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Arrive => "arrive",
            Stage::Act => "act",
            Stage::Classify => "classify",
            Stage::Assert => "assert",
            Stage::Evidence => "evidence",
        };
        f.write_str(name)
    }
}

/// A scenario error together with the stage that raised it
#[derive(Debug)]
pub struct ScenarioFailure {
    pub stage: Stage,
    pub error: Error,
}

impl ScenarioFailure {
    pub fn new(stage: Stage, error: Error) -> Self {
        Self { stage, error }
    }

    /// Stage plus the full `source()` chain, for the report's trace column
    pub fn trace(&self) -> String {
        let mut trace = format!("Error: {}\n    at stage {}", self.error, self.stage);
        let mut source = StdError::source(&self.error);
        while let Some(cause) = source {
            trace.push_str(&format!("\n    caused by: {}", cause));
            source = cause.source();
        }
        trace
    }
}

impl fmt::Display for ScenarioFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.error)
    }
}

/// Attach a stage to a fallible step
pub trait StageExt<T> {
    fn at(self, stage: Stage) -> Result<T, ScenarioFailure>;
}

impl<T> StageExt<T> for crate::common::Result<T> {
    fn at(self, stage: Stage) -> Result<T, ScenarioFailure> {
        self.map_err(|error| ScenarioFailure::new(stage, error))
    }
}

/// One row of the test report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Suite the scenario belongs to
    pub file: String,
    /// Full title path joined with " > "
    pub title: String,
    /// Short test name
    pub name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    /// Browser variant the scenario ran under
    pub project: String,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub error_trace: Option<String>,
    pub screenshot: Option<PathBuf>,
    pub video: Option<PathBuf>,
    pub start_time: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + ChronoDuration::milliseconds(self.duration_ms as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_parsing() {
        assert_eq!(" success ".parse::<Outcome>(), Ok(Outcome::Success));
        assert_eq!("Failure".parse::<Outcome>(), Ok(Outcome::Failure));
        assert!("Maybe".parse::<Outcome>().is_err());
        assert_eq!(Outcome::from(true), Outcome::Success);
    }

    #[test]
    fn test_status_spelling() {
        for status in [
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Skipped,
            TestStatus::TimedOut,
        ] {
            assert_eq!(status.as_str().parse::<TestStatus>(), Ok(status));
        }
        assert!(TestStatus::TimedOut.is_failure());
        assert!(!TestStatus::Skipped.is_failure());
    }

    #[test]
    fn test_trace_names_stage() {
        let failure = ScenarioFailure::new(Stage::Arrive, Error::navigation("Sign in button", 5000));
        let trace = failure.trace();
        assert!(trace.starts_with("Error: Navigation failed: Sign in button not visible"));
        assert!(trace.contains("at stage arrive"));
    }

    #[test]
    fn test_end_time_derived() {
        let start = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = OutcomeRecord {
            file: "login".into(),
            title: "t".into(),
            name: "n".into(),
            status: TestStatus::Passed,
            duration_ms: 1500,
            project: "Chromium".into(),
            retry_count: 0,
            error_message: None,
            error_trace: None,
            screenshot: None,
            video: None,
            start_time: start,
        };
        assert_eq!(record.end_time().to_rfc3339(), "2026-01-02T03:04:06.500+00:00");
    }
}
