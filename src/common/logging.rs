//! Logging and tracing configuration
//!
//! Console output goes to stderr so the list reporter on stdout stays
//! readable. When a log directory is available every run also appends to
//! `run.log` there, with full details.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

/// File name of the run log inside the log directory
pub const RUN_LOG_FILE: &str = "run.log";

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("ui_trials=debug,warn")
        } else {
            EnvFilter::new("ui_trials=info,warn")
        }
    })
}

/// Initialize tracing for the CLI (stderr only)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate (DEBUG with `verbose`), WARN for dependencies.
pub fn init_cli(verbose: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for a test run (run log file + stderr)
///
/// The returned guard flushes the file writer when dropped, so it has to
/// live until the run finishes. Falls back to stderr only when the log
/// directory cannot be created.
pub fn init_run(log_dir: &Path, verbose: bool) -> Option<(WorkerGuard, PathBuf)> {
    if let Err(e) = paths::ensure_dir(log_dir) {
        eprintln!("Warning: Could not create log directory {}: {}", log_dir.display(), e);
        init_cli(verbose);
        return None;
    }

    let appender = tracing_appender::rolling::never(log_dir, RUN_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Some((guard, log_dir.join(RUN_LOG_FILE)))
}
