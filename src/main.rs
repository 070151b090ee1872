//! ui-trials - data-driven end-to-end UI tests
//!
//! Drives a browser through the application's login and requirement
//! creation workflows and writes every outcome to a spreadsheet report.

use clap::Parser;
use ui_trials::cli;
use ui_trials::commands::{Commands, GlobalOptions};

#[derive(Parser)]
#[command(name = "ui-trials", about = "Data-driven end-to-end UI test suite")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli::dispatch(cli.command, cli.options).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
