//! UI test suites
//!
//! Scenarios drive a [`crate::browser::Page`] through the application and
//! classify what they observe; the runner turns each into one report row.
//! Assertions are made on classified outcomes, never on raw page text.

mod classify;
mod evidence;
mod fixture;
pub mod login;
mod outcome;
pub mod poller;
pub mod readiness;
mod recorder;
mod runner;

pub use classify::{classify, Classification, SignalKind, SuccessSignals};
pub use evidence::EvidenceStore;
pub use fixture::{load_fixture, TestCaseRecord};
pub use outcome::{Outcome, OutcomeRecord, ScenarioFailure, Stage, StageExt, TestStatus};
pub use poller::{SignalPattern, SignalPoller};
pub use recorder::{read_report, ResultRecorder, REPORT_COLUMNS, REPORT_SHEET};
pub use runner::{print_summary, Attempt, RunSummary, Runner, Scenario, FAILURE_SCREENSHOT};
