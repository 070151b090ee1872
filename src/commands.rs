//! CLI command definitions
//!
//! Defines the clap commands for the ui-trials CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Default login fixture, relative to the working directory
pub const DEFAULT_FIXTURE: &str = "tests/data/loginTestData.xlsx";

#[derive(Subcommand)]
pub enum Commands {
    /// Run the data-driven login suite
    Login {
        /// Spreadsheet with one login scenario per row
        #[arg(long, default_value = DEFAULT_FIXTURE)]
        fixture: PathBuf,
    },

    /// Run the requirement-creation scenario (needs TEST_EMAIL / TEST_PASSWORD)
    Readiness,

    /// Run both suites into one report, login first
    Run {
        /// Spreadsheet with one login scenario per row
        #[arg(long, default_value = DEFAULT_FIXTURE)]
        fixture: PathBuf,
    },

    /// Summarize an existing report
    Summary {
        /// Report written by a previous run
        report: PathBuf,
    },
}

/// Options shared by every command; they override the config file
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Config file (default: ./ui-trials.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Origin of the application under test
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headed: bool,

    /// Scenarios to run concurrently
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Extra attempts for failing scenarios
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// Report file to write
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Chromium project label recorded with every result
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}
