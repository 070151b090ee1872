//! ui-trials - data-driven end-to-end UI tests
//!
//! Scenarios are described once and executed against any
//! [`browser::BrowserEngine`]; fixtures come from spreadsheets and results
//! go back into one.

pub mod browser;
pub mod cli;
pub mod commands;
pub mod common;
pub mod sheet;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
