//! Error types for the UI test suite
//!
//! Messages end up verbatim in the `error` column of the report, so they
//! name the control, bound or value that was involved.

use std::io;
use thiserror::Error;

use crate::browser::Locator;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the UI test suite
#[derive(Error, Debug)]
pub enum Error {
    // === Fixture Errors (run-fatal) ===
    #[error("Failed to load fixture '{path}': {reason}")]
    FixtureLoad { path: String, reason: String },

    // === Scenario Errors (fail one scenario) ===
    #[error("Navigation failed: {what} not visible within {timeout_ms}ms")]
    Navigation { what: String, timeout_ms: u64 },

    #[error("Element not found: {locator} not visible within {timeout_ms}ms")]
    ElementNotFound { locator: String, timeout_ms: u64 },

    #[error("{context}. Expected={expected}, Actual={actual}")]
    AssertionMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("{0}")]
    NoSuccessSignal(String),

    #[error("Scenario timed out after {0}ms")]
    ScenarioTimeout(u64),

    #[error("Scenario skipped: {0}")]
    Skipped(String),

    // === Evidence Errors (logged, never fatal) ===
    #[error("Evidence capture failed for '{name}': {reason}")]
    EvidenceCapture { name: String, reason: String },

    // === Browser Errors ===
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    // === Spreadsheet Errors ===
    #[error("Spreadsheet error in '{path}': {reason}")]
    Spreadsheet { path: String, reason: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid signal pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

}

impl Error {
    /// Create a fixture load error
    pub fn fixture(path: impl AsRef<std::path::Path>, reason: impl Into<String>) -> Self {
        Self::FixtureLoad {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Create a navigation error for a control that never became visible
    pub fn navigation(what: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Navigation {
            what: what.into(),
            timeout_ms,
        }
    }

    /// Create an element not found error
    pub fn element_not_found(locator: &Locator, timeout_ms: u64) -> Self {
        Self::ElementNotFound {
            locator: locator.to_string(),
            timeout_ms,
        }
    }

    /// Create an assertion mismatch error carrying both values
    pub fn mismatch(
        context: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::AssertionMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an evidence capture error
    pub fn evidence(name: &str, reason: impl ToString) -> Self {
        Self::EvidenceCapture {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a spreadsheet error
    pub fn spreadsheet(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::Spreadsheet {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_embeds_both_values() {
        let err = Error::mismatch("Login outcome mismatch", "Failure", "Success");
        assert_eq!(
            err.to_string(),
            "Login outcome mismatch. Expected=Failure, Actual=Success"
        );
    }

    #[test]
    fn test_structured_messages() {
        assert_eq!(
            Error::navigation("Sign in button", 5000).to_string(),
            "Navigation failed: Sign in button not visible within 5000ms"
        );
        assert_eq!(
            Error::fixture("data/login.xlsx", "sheet is empty").to_string(),
            "Failed to load fixture 'data/login.xlsx': sheet is empty"
        );
        let locator = Locator::role("menuitem", "create requirement");
        assert_eq!(
            Error::element_not_found(&locator, 3000).to_string(),
            "Element not found: role=menuitem[name=/create requirement/i] not visible within 3000ms"
        );
    }
}
