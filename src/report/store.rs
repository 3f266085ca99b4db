//! Persistence of test-run samples into the report workbook.

use super::calc::AVERAGES_TITLE;
use super::{load_or_new, put, read_grid, save, write_grid, Grid};
use crate::channel::Sample;
use crate::error::{PowerMeterError, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Marker written in place of a sample that does not parse as a number.
/// Averages skip it arithmetically, since it never parses back as `f64`.
pub const MISSING_VALUE: &str = "N/A";

/// Diagnostics from one committed run.
#[derive(Debug, Clone, Copy)]
pub struct WriteSummary {
    pub rows_written: usize,
    /// Samples whose text failed numeric coercion (column layout only).
    /// Reported for diagnostics; never blocks the write.
    pub coercion_failures: usize,
}

/// Handle on one workbook file and target sheet.
///
/// Writes read the current sheet fully, overlay the run, and rewrite the
/// sheet in full, so columns and rows belonging to other recorded tests are
/// preserved and a re-run test replaces its own data. Once the calculator
/// has restructured the sheet (headers shifted down, averages inserted),
/// further writes are refused: a run landing against row 1 of a shifted
/// sheet would misalign with every recorded column and silently stale the
/// computed averages.
#[derive(Debug, Clone)]
pub struct ReportStore {
    workbook: PathBuf,
    sheet: String,
}

impl ReportStore {
    pub fn new(workbook: impl Into<PathBuf>, sheet: &str) -> Self {
        Self {
            workbook: workbook.into(),
            sheet: sanitize_sheet_name(sheet),
        }
    }

    /// Same sheet, different workbook file (per-test output override).
    pub fn with_workbook(&self, workbook: impl Into<PathBuf>) -> Self {
        Self {
            workbook: workbook.into(),
            sheet: self.sheet.clone(),
        }
    }

    pub fn workbook(&self) -> &Path {
        &self.workbook
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Column layout: the run becomes a named column of numeric values, one
    /// row per sample, header in row 1. Non-numeric sample text is coerced
    /// to [`MISSING_VALUE`]. An existing column with the same name is
    /// overwritten in place.
    pub fn write_run_column(&self, test_name: &str, samples: &[Sample]) -> Result<WriteSummary> {
        let mut book = load_or_new(&self.workbook);
        let mut grid: Grid = book
            .get_sheet_by_name(&self.sheet)
            .map(read_grid)
            .unwrap_or_default();
        self.refuse_calculated(&grid)?;

        let col = Self::find_header_column(&grid, test_name).unwrap_or_else(|| {
            grid.first().map_or(0, Vec::len)
        });

        // Wipe the column first so a shorter re-run leaves no stale tail.
        for row in grid.iter_mut().skip(1) {
            if col < row.len() {
                row[col] = String::new();
            }
        }

        put(&mut grid, 0, col, test_name);
        let mut coercion_failures = 0;
        for (i, sample) in samples.iter().enumerate() {
            let value = if sample.text.parse::<f64>().is_ok() {
                sample.text.clone()
            } else {
                coercion_failures += 1;
                MISSING_VALUE.to_string()
            };
            put(&mut grid, i + 1, col, value);
        }
        if coercion_failures > 0 {
            warn!(
                "{coercion_failures} of {} samples for '{test_name}' were not numeric",
                samples.len()
            );
        }

        write_grid(&mut book, &self.sheet, &grid)?;
        save(&book, &self.workbook)?;
        info!(
            "committed {} samples for '{test_name}' to '{}'",
            samples.len(),
            self.workbook.display()
        );
        Ok(WriteSummary {
            rows_written: samples.len(),
            coercion_failures,
        })
    }

    /// Row layout: the run becomes a row whose first cell is the test name
    /// and remaining cells are the raw sample texts, widening the table when
    /// this run has more samples than prior rows. An existing row with the
    /// same name is replaced.
    pub fn write_run_row(&self, test_name: &str, samples: &[Sample]) -> Result<WriteSummary> {
        let mut book = load_or_new(&self.workbook);
        let mut grid: Grid = book
            .get_sheet_by_name(&self.sheet)
            .map(read_grid)
            .unwrap_or_default();
        self.refuse_calculated(&grid)?;

        let target = grid
            .iter()
            .position(|row| row.first().is_some_and(|name| name == test_name))
            .unwrap_or(grid.len());

        let mut row = Vec::with_capacity(samples.len() + 1);
        row.push(test_name.to_string());
        row.extend(samples.iter().map(|s| s.text.clone()));

        if target == grid.len() {
            grid.push(row);
        } else {
            grid[target] = row;
        }

        write_grid(&mut book, &self.sheet, &grid)?;
        save(&book, &self.workbook)?;
        Ok(WriteSummary {
            rows_written: samples.len(),
            coercion_failures: 0,
        })
    }

    /// A sheet that has been through the calculator carries the averages
    /// title in its top-left cell and its headers shifted down two rows; any
    /// further run write would misalign against that layout.
    fn refuse_calculated(&self, grid: &Grid) -> Result<()> {
        let calculated = grid
            .first()
            .and_then(|row| row.first())
            .is_some_and(|top_left| top_left == AVERAGES_TITLE);
        if calculated {
            return Err(PowerMeterError::Precondition(format!(
                "sheet '{}' already holds calculated rows; record all runs before adding calculations",
                self.sheet
            )));
        }
        Ok(())
    }

    fn find_header_column(grid: &Grid, test_name: &str) -> Option<usize> {
        grid.first()?
            .iter()
            .position(|header| header.eq_ignore_ascii_case(test_name))
    }
}

/// Workbook sheet names are limited to 31 characters and a restricted
/// character set.
pub fn sanitize_sheet_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '[' | ']' | '*' | '/' | '\\' | '?' | ':'))
        .take(31)
        .collect()
}
