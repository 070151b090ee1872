//! CLI command handling
//!
//! Resolves configuration, launches the browser and runs the selected
//! suites. Only a bad fixture, a browser that will not start or a report
//! that cannot be written abort a run; everything else ends up in the
//! report.

use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::browser::chrome::ChromeEngine;
use crate::browser::BrowserEngine;
use crate::commands::{Commands, GlobalOptions};
use crate::common::config::Config;
use crate::common::{logging, Result};
use crate::testing::{
    load_fixture, login, print_summary, read_report, readiness, ResultRecorder, RunSummary, Runner,
    TestCaseRecord, TestStatus,
};

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands, options: GlobalOptions) -> Result<i32> {
    match command {
        Commands::Login { fixture } => run_suites(&options, Some(fixture), false).await,
        Commands::Readiness => run_suites(&options, None, true).await,
        Commands::Run { fixture } => run_suites(&options, Some(fixture), true).await,
        Commands::Summary { report } => {
            logging::init_cli(options.verbose);
            summarize(&report)
        }
    }
}

/// Configuration for this invocation: file, then environment, then flags
pub fn resolve_config(options: &GlobalOptions) -> Result<Config> {
    let mut config = Config::load(options.config.as_deref())?;
    config.apply_env();
    apply_overrides(&mut config, options);
    config.validate()?;
    Ok(config)
}

/// Apply command-line flags on top of `config`
pub fn apply_overrides(config: &mut Config, options: &GlobalOptions) {
    if let Some(base_url) = &options.base_url {
        config.target.base_url = base_url.clone();
    }
    if options.headed {
        config.browser.headless = false;
    }
    if let Some(workers) = options.workers {
        config.run.workers = workers;
    }
    if let Some(retries) = options.retries {
        config.run.retries = retries;
    }
    if let Some(report) = &options.report {
        config.output.report_path = report.clone();
    }
    if let Some(project) = &options.project {
        config.browser.project = project.clone();
    }
}

async fn run_suites(options: &GlobalOptions, fixture: Option<PathBuf>, with_readiness: bool) -> Result<i32> {
    let config = resolve_config(options)?;
    let _log = logging::init_run(&config.output.log_dir, options.verbose);
    tracing::debug!(base_url = %config.target.base_url, "Configuration resolved");

    // A broken fixture must fail the run before any browser work
    let records = fixture.as_deref().map(load_fixture).transpose()?;

    let engine = ChromeEngine::launch(&config.browser).await?;
    let result = execute(&engine, &config, records, with_readiness).await;
    if let Err(e) = engine.shutdown().await {
        tracing::warn!(error = %e, "Browser did not shut down cleanly");
    }
    let summary = result?;

    print_summary(&summary);
    println!(
        "\n  {} {}",
        "Report:".dimmed(),
        config.output.report_path.display()
    );
    Ok(if summary.has_failures() { 1 } else { 0 })
}

/// Run the selected suites against `engine` and write the report
pub async fn execute(
    engine: &dyn BrowserEngine,
    config: &Config,
    login_records: Option<Vec<TestCaseRecord>>,
    with_readiness: bool,
) -> Result<RunSummary> {
    let recorder = ResultRecorder::new();
    let runner = Runner::new(engine, config, &recorder);

    if let Some(records) = login_records {
        println!(
            "\n{} {}",
            "Running Suite:".blue().bold(),
            login::DESCRIBE.white().bold()
        );
        runner.run_suite(&login::suite(records)).await;
    }

    if with_readiness {
        println!(
            "\n{} {}",
            "Running Suite:".blue().bold(),
            readiness::DESCRIBE.white().bold()
        );
        runner.run_suite(&readiness::suite()).await;
    }

    recorder.flush(&config.output.report_path)?;
    Ok(RunSummary::from_records(&recorder.records()))
}

/// Print counts and failing titles of a stored report
fn summarize(report: &Path) -> Result<i32> {
    let records = read_report(report)?;
    let summary = RunSummary::from_records(&records);

    println!(
        "{} {}",
        "Report:".blue().bold(),
        report.display().to_string().white().bold()
    );
    print_summary(&summary);

    let failing: Vec<_> = records.iter().filter(|r| r.status.is_failure()).collect();
    if !failing.is_empty() {
        println!("\n{}", "Failures:".red().bold());
        for record in failing {
            let mark = if record.status == TestStatus::TimedOut { "✘" } else { "✗" };
            println!("  {} {}", mark.red(), record.title);
            if let Some(message) = &record.error_message {
                println!("      {}", message.dimmed());
            }
        }
    }

    Ok(if summary.has_failures() { 1 } else { 0 })
}
