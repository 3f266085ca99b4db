//! Report workbook: persistence of test runs and derived statistics.
//!
//! The workbook format has no partial-update primitive, so every write reads
//! the target sheet fully into an in-memory grid, extends or overlays it,
//! and rewrites the sheet in full. That full-overwrite strategy is what
//! makes re-running a test with the same name replace its data instead of
//! duplicating it, and what guarantees other tests' columns are never
//! corrupted.
//!
//! Not safe against concurrent external modification of the same file; the
//! tool assumes single-operator, single-process usage.

pub mod calc;
pub mod store;

use crate::error::{PowerMeterError, Result};
use log::warn;
use std::path::Path;
use umya_spreadsheet::{Spreadsheet, Worksheet};

/// In-memory image of a sheet: row-major, 1-based cells flattened to 0-based
/// vectors, every cell as text. Rows may be ragged; missing cells are blank.
pub(crate) type Grid = Vec<Vec<String>>;

/// Read the whole sheet into a grid.
pub(crate) fn read_grid(sheet: &Worksheet) -> Grid {
    let rows = sheet.get_highest_row();
    let cols = sheet.get_highest_column();
    (1..=rows)
        .map(|r| (1..=cols).map(|c| sheet.get_value((c, r))).collect())
        .collect()
}

/// Replace the named sheet with the grid's content. Cells that parse as
/// numbers are written as numbers so spreadsheet consumers see numeric
/// columns; everything else is written as text. Blank cells are omitted.
pub(crate) fn write_grid(book: &mut Spreadsheet, sheet_name: &str, grid: &Grid) -> Result<()> {
    if book.get_sheet_by_name(sheet_name).is_some() {
        book.remove_sheet_by_name(sheet_name)
            .map_err(|e| PowerMeterError::Persistence(format!("cannot replace sheet: {e}")))?;
    }
    let sheet = book
        .new_sheet(sheet_name)
        .map_err(|e| PowerMeterError::Persistence(format!("cannot create sheet: {e}")))?;

    for (r, row) in grid.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let cell = sheet.get_cell_mut(((c + 1) as u32, (r + 1) as u32));
            match value.parse::<f64>() {
                Ok(n) => {
                    cell.set_value_number(n);
                }
                Err(_) => {
                    cell.set_value(value.as_str());
                }
            }
        }
    }
    Ok(())
}

/// Set one grid cell, growing rows and columns as needed.
pub(crate) fn put(grid: &mut Grid, row: usize, col: usize, value: impl Into<String>) {
    while grid.len() <= row {
        grid.push(Vec::new());
    }
    let cells = &mut grid[row];
    while cells.len() <= col {
        cells.push(String::new());
    }
    cells[col] = value.into();
}

/// Open the workbook at `path`, or start a fresh one when the file does not
/// exist. An unreadable file is also treated as fresh (with a warning), per
/// the fresh-table rule for unreadable targets.
pub(crate) fn load_or_new(path: &Path) -> Spreadsheet {
    if path.exists() {
        match umya_spreadsheet::reader::xlsx::read(path) {
            Ok(book) => return book,
            Err(e) => {
                warn!(
                    "workbook '{}' is unreadable ({e}); starting a fresh one",
                    path.display()
                );
            }
        }
    }
    umya_spreadsheet::new_file_empty_worksheet()
}

/// Open an existing workbook; unlike [`load_or_new`], absence is an error.
pub(crate) fn load_existing(path: &Path) -> Result<Spreadsheet> {
    umya_spreadsheet::reader::xlsx::read(path).map_err(|e| {
        PowerMeterError::Persistence(format!("cannot read workbook '{}': {e}", path.display()))
    })
}

pub(crate) fn save(book: &Spreadsheet, path: &Path) -> Result<()> {
    umya_spreadsheet::writer::xlsx::write(book, path).map_err(|e| {
        PowerMeterError::Persistence(format!("cannot write workbook '{}': {e}", path.display()))
    })
}

/// Spreadsheet column letter for a 1-based column index (1 -> A, 27 -> AA).
pub(crate) fn column_letter(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        letters.push(b'A' + rem);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}
