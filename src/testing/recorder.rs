//! Tabular test report
//!
//! Outcomes arrive from concurrent workers in completion order. Each suite
//! reserves a block of sequence numbers up front and records under
//! `base + index`, so the report always lists scenarios in declaration
//! order no matter which finished first.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::outcome::{OutcomeRecord, TestStatus};
use crate::common::{Error, Result};
use crate::sheet::{self, Cell};

/// Name of the single report sheet
pub const REPORT_SHEET: &str = "Test Results";

/// Report columns, in order
pub const REPORT_COLUMNS: [&str; 13] = [
    "file",
    "testCaseTitle",
    "name",
    "status",
    "duration",
    "project",
    "retries",
    "error",
    "errorStack",
    "screenshot",
    "video",
    "startTime",
    "endTime",
];

/// Collects outcome records for one run
#[derive(Debug, Default)]
pub struct ResultRecorder {
    next_seq: AtomicUsize,
    records: Mutex<BTreeMap<usize, OutcomeRecord>>,
}

impl ResultRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `count` consecutive sequence numbers, returning the first
    pub fn reserve(&self, count: usize) -> usize {
        self.next_seq.fetch_add(count, Ordering::SeqCst)
    }

    /// Store the record of the scenario at `seq`; safe from any worker
    pub fn record(&self, seq: usize, record: OutcomeRecord) {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if records.insert(seq, record).is_some() {
            tracing::warn!(seq, "Outcome recorded twice, keeping the last one");
        }
    }

    /// Records in sequence order
    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Write the report, replacing any previous file at `path`
    pub fn flush(&self, path: &Path) -> Result<()> {
        let records = self.records();
        let rows: Vec<Vec<Cell>> = records.iter().map(to_row).collect();
        sheet::write_rows(path, REPORT_SHEET, &REPORT_COLUMNS, &rows)?;
        tracing::info!(path = %path.display(), rows = rows.len(), "Report written");
        Ok(())
    }
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn path_cell(path: &Option<PathBuf>) -> Cell {
    path.as_ref()
        .map(|p| p.display().to_string())
        .into()
}

fn to_row(record: &OutcomeRecord) -> Vec<Cell> {
    vec![
        record.file.as_str().into(),
        record.title.as_str().into(),
        record.name.as_str().into(),
        record.status.as_str().into(),
        Cell::Number(record.duration_ms as f64),
        record.project.as_str().into(),
        Cell::Number(f64::from(record.retry_count)),
        record.error_message.clone().into(),
        record.error_trace.clone().into(),
        path_cell(&record.screenshot),
        path_cell(&record.video),
        timestamp(record.start_time).into(),
        timestamp(record.end_time()).into(),
    ]
}

/// Read a report written by [`ResultRecorder::flush`]
pub fn read_report(path: &Path) -> Result<Vec<OutcomeRecord>> {
    let rows = sheet::read_rows(path)?;
    let (header, data) = rows
        .split_first()
        .ok_or_else(|| Error::spreadsheet(path, "report is empty"))?;

    let header: Vec<&str> = header.iter().map(|h| h.trim()).collect();
    if header != REPORT_COLUMNS {
        return Err(Error::spreadsheet(path, "unexpected report columns"));
    }

    data.iter()
        .enumerate()
        .map(|(i, row)| from_row(row).map_err(|reason| Error::spreadsheet(path, format!("row {}: {}", i + 2, reason))))
        .collect()
}

fn from_row(row: &[String]) -> std::result::Result<OutcomeRecord, String> {
    let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
    let optional = |i: usize| Some(cell(i)).filter(|v| !v.is_empty()).map(str::to_string);

    let status: TestStatus = cell(3).parse()?;
    let duration_ms = cell(4)
        .parse::<u64>()
        .map_err(|e| format!("duration: {}", e))?;
    let retry_count = cell(6)
        .parse::<u32>()
        .map_err(|e| format!("retries: {}", e))?;
    let start_time = DateTime::parse_from_rfc3339(cell(11))
        .map_err(|e| format!("startTime: {}", e))?
        .with_timezone(&Utc);

    Ok(OutcomeRecord {
        file: cell(0).to_string(),
        title: cell(1).to_string(),
        name: cell(2).to_string(),
        status,
        duration_ms,
        project: cell(5).to_string(),
        retry_count,
        error_message: optional(7),
        error_trace: optional(8),
        screenshot: optional(9).map(PathBuf::from),
        video: optional(10).map(PathBuf::from),
        start_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, status: TestStatus) -> OutcomeRecord {
        OutcomeRecord {
            file: "login".to_string(),
            title: format!("Chromium > login > Login Tests > {}", name),
            name: name.to_string(),
            status,
            duration_ms: 1234,
            project: "Chromium".to_string(),
            retry_count: 0,
            error_message: None,
            error_trace: None,
            screenshot: None,
            video: None,
            start_time: DateTime::parse_from_rfc3339("2026-03-01T10:00:00.250Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_records_follow_sequence_not_arrival() {
        let recorder = ResultRecorder::new();
        let base = recorder.reserve(3);
        recorder.record(base + 2, record("third", TestStatus::Passed));
        recorder.record(base, record("first", TestStatus::Passed));
        recorder.record(base + 1, record("second", TestStatus::Failed));

        let names: Vec<String> = recorder.records().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(recorder.reserve(2), 3);
    }

    #[test]
    fn test_flush_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("reports").join("test-results.xlsx");

        let mut failed = record("Login • TC02 • bad@x.com • expect=Failure", TestStatus::Failed);
        failed.retry_count = 1;
        failed.error_message = Some("Login outcome mismatch. Expected=Failure, Actual=Success".into());
        failed.error_trace = Some("Error: ...\n    at stage assert".into());
        failed.screenshot = Some(PathBuf::from("reports/evidence/tc02/page.png"));

        let recorder = ResultRecorder::new();
        recorder.record(0, record("Login • TC01 • a@b.c • expect=Success", TestStatus::Passed));
        recorder.record(1, failed.clone());
        recorder.flush(&path).unwrap();

        let rows = sheet::read_rows(&path).unwrap();
        assert_eq!(rows[0], REPORT_COLUMNS);
        assert_eq!(rows[1][3], "passed");
        assert_eq!(rows[1][4], "1234");
        assert_eq!(rows[1][7], "");
        assert_eq!(rows[1][11], "2026-03-01T10:00:00.250Z");
        assert_eq!(rows[1][12], "2026-03-01T10:00:01.484Z");

        let back = read_report(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[1], failed);
    }

    #[test]
    fn test_flush_overwrites_previous_report() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("test-results.xlsx");

        let first = ResultRecorder::new();
        first.record(0, record("a", TestStatus::Passed));
        first.record(1, record("b", TestStatus::Passed));
        first.flush(&path).unwrap();

        let second = ResultRecorder::new();
        second.record(0, record("c", TestStatus::Skipped));
        second.flush(&path).unwrap();

        let back = read_report(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].status, TestStatus::Skipped);
    }

    #[test]
    fn test_empty_run_writes_header_only() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.xlsx");
        ResultRecorder::new().flush(&path).unwrap();
        assert!(read_report(&path).unwrap().is_empty());
    }
}
