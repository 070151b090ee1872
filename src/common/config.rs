//! Configuration file handling
//!
//! Configuration is resolved once per run (defaults, TOML file, environment,
//! CLI flags) and then handed to the suites by reference; nothing below the
//! CLI layer reads the process environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::resolve_config_path;
use super::Result;
use crate::testing::SignalKind;

/// Environment variable for the target application origin
pub const ENV_BASE_URL: &str = "BASE_URL";

/// Environment variable for the account used by authenticated flows
pub const ENV_TEST_EMAIL: &str = "TEST_EMAIL";

/// Environment variable for the password used by authenticated flows
pub const ENV_TEST_PASSWORD: &str = "TEST_PASSWORD";

/// Default target application origin
pub const DEFAULT_BASE_URL: &str = "http://3.213.139.49:8081";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Application under test
    #[serde(default)]
    pub target: TargetConfig,

    /// Credentials for authenticated flows
    #[serde(default)]
    pub credentials: Credentials,

    /// Browser settings
    #[serde(default)]
    pub browser: BrowserSettings,

    /// Timeout settings in milliseconds
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Scheduling of scenarios
    #[serde(default)]
    pub run: RunSettings,

    /// Report and evidence locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Requirement-creation workflow policy
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

/// Application under test
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Origin of the application, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl TargetConfig {
    /// Join a path onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Credentials for authenticated flows
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Both halves of the credentials, if configured
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        }
    }
}

/// Browser settings
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// Run without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Viewport width in pixels
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Viewport height in pixels
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Label for the report's project column; the engine is always Chromium,
    /// so names of other engines are rejected
    #[serde(default = "default_project")]
    pub project: String,

    /// Explicit browser executable (otherwise auto-detected)
    #[serde(default)]
    pub executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            project: default_project(),
            executable: None,
        }
    }
}

fn default_headless() -> bool {
    true
}
fn default_viewport_width() -> u32 {
    1280
}
fn default_viewport_height() -> u32 {
    720
}
/// Engines the CDP driver cannot launch
const OTHER_ENGINES: [&str; 3] = ["firefox", "webkit", "safari"];

fn default_project() -> String {
    "Chromium".to_string()
}

/// Timeout settings in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct Timeouts {
    /// Budget for one whole scenario
    #[serde(default = "default_scenario")]
    pub scenario_ms: u64,

    /// Bound for a required control to become visible
    #[serde(default = "default_expect")]
    pub expect_ms: u64,

    /// Budget for the login success toast
    #[serde(default = "default_login_toast")]
    pub login_toast_ms: u64,

    /// Budget for the requirement-created toast
    #[serde(default = "default_readiness_toast")]
    pub readiness_toast_ms: u64,

    /// Budget for the save response of the requirement form
    #[serde(default = "default_response")]
    pub response_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            scenario_ms: default_scenario(),
            expect_ms: default_expect(),
            login_toast_ms: default_login_toast(),
            readiness_toast_ms: default_readiness_toast(),
            response_ms: default_response(),
        }
    }
}

fn default_scenario() -> u64 {
    30_000
}
fn default_expect() -> u64 {
    5_000
}
fn default_login_toast() -> u64 {
    5_000
}
fn default_readiness_toast() -> u64 {
    7_000
}
fn default_response() -> u64 {
    10_000
}

impl Timeouts {
    pub fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }

    pub fn expect(&self) -> Duration {
        Duration::from_millis(self.expect_ms)
    }
}

/// Scheduling of scenarios
#[derive(Debug, Clone, Deserialize)]
pub struct RunSettings {
    /// Scenarios executed concurrently (each with its own browser context)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Extra attempts for a scenario that did not pass
    #[serde(default)]
    pub retries: u32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            retries: 0,
        }
    }
}

fn default_workers() -> usize {
    1
}

/// Report and evidence locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Spreadsheet report written at the end of a run
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,

    /// Directory receiving per-scenario evidence
    #[serde(default = "default_evidence_dir")]
    pub evidence_dir: PathBuf,

    /// Directory receiving the run log
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: default_report_path(),
            evidence_dir: default_evidence_dir(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_report_path() -> PathBuf {
    PathBuf::from("reports/test-results.xlsx")
}
fn default_evidence_dir() -> PathBuf {
    PathBuf::from("reports/evidence")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("reports/logs")
}

/// Requirement-creation workflow policy
#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    /// Order in which success signals are consulted after submitting
    #[serde(default = "default_signal_order")]
    pub signal_order: Vec<SignalKind>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            signal_order: default_signal_order(),
        }
    }
}

fn default_signal_order() -> Vec<SignalKind> {
    vec![SignalKind::Network, SignalKind::Toast, SignalKind::ListRow]
}

impl Config {
    /// Load configuration from the resolved config file
    ///
    /// Returns default configuration if no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match resolve_config_path(explicit) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay the recognized environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay environment values obtained through `lookup`
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.target.base_url = url;
        }
        if let Some(email) = non_empty(ENV_TEST_EMAIL) {
            self.credentials.email = Some(email);
        }
        if let Some(password) = non_empty(ENV_TEST_PASSWORD) {
            self.credentials.password = Some(password);
        }
    }

    /// Reject settings no run could work with
    pub fn validate(&self) -> Result<()> {
        if self.run.workers == 0 {
            return Err(super::Error::Config("run.workers must be at least 1".to_string()));
        }
        if self.readiness.signal_order.is_empty() {
            return Err(super::Error::Config(
                "readiness.signal_order must name at least one signal".to_string(),
            ));
        }
        let project = self.browser.project.to_ascii_lowercase();
        if project.trim().is_empty() {
            return Err(super::Error::Config("browser.project must not be empty".to_string()));
        }
        if let Some(engine) = OTHER_ENGINES.iter().find(|e| project.contains(*e)) {
            return Err(super::Error::Config(format!(
                "browser.project '{}' names {}, but scenarios only run in Chromium",
                self.browser.project, engine
            )));
        }
        if !self.target.base_url.starts_with("http://")
            && !self.target.base_url.starts_with("https://")
        {
            return Err(super::Error::Config(format!(
                "target.base_url must be an http(s) URL, got '{}'",
                self.target.base_url
            )));
        }
        Ok(())
    }
}
