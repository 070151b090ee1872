//! Spreadsheet access
//!
//! Reading goes through `calamine` (xlsx, xls, ods), writing through
//! `rust_xlsxwriter` (xlsx). Only the first sheet is read; cells come back
//! as display strings.

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

use crate::common::paths::ensure_parent;
use crate::common::{Error, Result};

/// A cell to be written
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<Option<String>> for Cell {
    fn from(s: Option<String>) -> Self {
        s.map(Cell::Text).unwrap_or(Cell::Empty)
    }
}

/// Read every row of the first sheet, header included
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    if !path.exists() {
        return Err(Error::spreadsheet(path, "file does not exist"));
    }

    let mut workbook = open_workbook_auto(path).map_err(|e| Error::spreadsheet(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::spreadsheet(path, "workbook has no sheets"))?
        .map_err(|e| Error::spreadsheet(path, e))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

/// Render a cell the way it reads in the sheet
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => b.to_string(),
        Data::Int(i) => i.to_string(),
        // Integral numbers are stored as floats; "12345" must not become "12345.0"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

/// Write one sheet with a bold header row, replacing any existing file
pub fn write_rows(path: &Path, sheet_name: &str, header: &[&str], rows: &[Vec<Cell>]) -> Result<()> {
    ensure_parent(path)?;

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name(sheet_name)
        .map_err(|e| Error::spreadsheet(path, e))?;

    for (col, title) in header.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *title, &bold)
            .map_err(|e| Error::spreadsheet(path, e))?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Text(text) => {
                    sheet
                        .write_string(r, c, text)
                        .map_err(|e| Error::spreadsheet(path, e))?;
                }
                Cell::Number(n) => {
                    sheet
                        .write_number(r, c, *n)
                        .map_err(|e| Error::spreadsheet(path, e))?;
                }
                Cell::Empty => {}
            }
        }
    }

    workbook.save(path).map_err(|e| Error::spreadsheet(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell_to_string(&Data::Float(12345.0)), "12345");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::String("Success".into())), "Success");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sheet.xlsx");

        write_rows(
            &path,
            "Results",
            &["name", "count", "note"],
            &[
                vec!["alpha".into(), Cell::Number(3.0), Cell::Empty],
                vec!["beta".into(), Cell::Number(0.25), "x".into()],
            ],
        )
        .unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows[0], vec!["name", "count", "note"]);
        assert_eq!(rows[1][0], "alpha");
        assert_eq!(rows[1][1], "3");
        assert_eq!(rows[2][1], "0.25");
        assert_eq!(rows[2][2], "x");
    }

    #[test]
    fn test_missing_file() {
        let err = read_rows(Path::new("/nonexistent/data.xlsx")).unwrap_err();
        assert!(matches!(err, Error::Spreadsheet { .. }));
    }
}
