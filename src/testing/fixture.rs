//! Spreadsheet fixtures
//!
//! One row per scenario; the header row names the fields. Column order is
//! free, extra columns are ignored.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::outcome::Outcome;
use crate::common::{Error, Result};
use crate::sheet;

/// Column holding the scenario identifier
pub const COL_TEST_CASE_ID: &str = "TestCaseID";
/// Column holding the login email
pub const COL_EMAIL: &str = "Email";
/// Column holding the login password
pub const COL_PASSWORD: &str = "Password";
/// Column holding `Success` or `Failure`
pub const COL_EXPECTED_RESULT: &str = "ExpectedResult";

const REQUIRED_COLUMNS: [&str; 4] = [COL_TEST_CASE_ID, COL_EMAIL, COL_PASSWORD, COL_EXPECTED_RESULT];

/// One row of login fixture data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseRecord {
    #[serde(rename = "TestCaseID")]
    pub test_case_id: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(rename = "ExpectedResult")]
    pub expected_result: Outcome,
}

/// Load the fixture records of the first sheet, in row order
pub fn load_fixture(path: &Path) -> Result<Vec<TestCaseRecord>> {
    let rows = sheet::read_rows(path).map_err(|e| match e {
        Error::Spreadsheet { reason, .. } => Error::fixture(path, reason),
        other => Error::fixture(path, other.to_string()),
    })?;
    let records = parse_rows(&rows).map_err(|reason| Error::fixture(path, reason))?;

    tracing::debug!(path = %path.display(), count = records.len(), "Loaded fixture");
    Ok(records)
}

/// Turn raw sheet rows (header first) into records
fn parse_rows(rows: &[Vec<String>]) -> std::result::Result<Vec<TestCaseRecord>, String> {
    let (header, data) = rows
        .split_first()
        .ok_or_else(|| "sheet is empty".to_string())?;

    let columns: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !columns.contains_key(c))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing required column(s): {}", missing.join(", ")));
    }

    // Cells pass through untrimmed
    let cell = |row: &[String], column: &str| -> String {
        row.get(columns[column]).cloned().unwrap_or_default()
    };

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (i, row) in data.iter().enumerate() {
        let row: &[String] = row;
        // Spreadsheet row numbers are 1-based and the header is row 1
        let row_number = i + 2;

        if row.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        let test_case_id = cell(row, COL_TEST_CASE_ID).trim().to_string();
        if test_case_id.is_empty() {
            return Err(format!("row {}: {} is empty", row_number, COL_TEST_CASE_ID));
        }
        if !seen.insert(test_case_id.clone()) {
            return Err(format!(
                "row {}: duplicate {} '{}'",
                row_number, COL_TEST_CASE_ID, test_case_id
            ));
        }

        let expected_result = cell(row, COL_EXPECTED_RESULT)
            .parse::<Outcome>()
            .map_err(|e| format!("row {}: {}: {}", row_number, COL_EXPECTED_RESULT, e))?;

        records.push(TestCaseRecord {
            test_case_id,
            email: cell(row, COL_EMAIL),
            password: cell(row, COL_PASSWORD),
            expected_result,
        });
    }

    if records.is_empty() {
        return Err("fixture has no data rows".to_string());
    }

    Ok(records)
}
