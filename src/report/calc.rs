//! Derived statistics injected into a populated report sheet.
//!
//! Both operations are idempotent: [`add_averages`] short-circuits when its
//! marker cell is already present, and [`add_total_annual_power`] overwrites
//! its own column in place on a second invocation.

use super::{column_letter, load_existing, put, read_grid, save, write_grid, Grid};
use crate::error::{PowerMeterError, Result};
use log::info;
use std::path::Path;
use umya_spreadsheet::{Border, HorizontalAlignmentValues, Worksheet};

/// Marker occupying the top-left summary cell once averages are in place.
pub const AVERAGES_TITLE: &str = "Averages";

/// Header of the derived weighted-sum column.
pub const TOTAL_ANNUAL_POWER_HEADER: &str = "Total Annual Power";

/// Hours per year scaled to kilo-units: watts in, kWh/year out.
const ANNUAL_KILO_HOURS: f64 = 8760.0 / 1000.0;

/// Duty-cycle weights applied to the four required column averages.
const WEIGHTS: [(&str, f64); 4] = [
    ("off", 0.15),
    ("shortidle", 0.45),
    ("longidle", 0.1),
    ("sleep", 0.3),
];

/// Row holding the per-column averages once [`add_averages`] has run.
const AVERAGES_ROW: u32 = 2;

/// Row holding the column headers once [`add_averages`] has run.
const HEADER_ROW: u32 = 3;

/// Insert two header rows above the data: a spanning "Averages" title in row
/// 1 and, for every data column, the arithmetic mean of that column's values
/// in row 2. Cells that do not parse as numbers (including the
/// missing-value marker) are excluded from the mean. Column headers end up
/// in row 3 with the data below them.
///
/// A no-op when the title cell is already in place.
pub fn add_averages(workbook: &Path, sheet_name: &str) -> Result<()> {
    let mut book = load_existing(workbook)?;
    let sheet = book.get_sheet_by_name(sheet_name).ok_or_else(|| {
        PowerMeterError::Persistence(format!("sheet '{sheet_name}' not found"))
    })?;

    if sheet.get_value((1, 1)) == AVERAGES_TITLE {
        info!("averages already present on '{sheet_name}'; nothing to do");
        return Ok(());
    }

    let grid = read_grid(sheet);
    if grid.is_empty() {
        return Err(PowerMeterError::Precondition(format!(
            "sheet '{sheet_name}' has no data to average"
        )));
    }
    let ncols = grid.iter().map(Vec::len).max().unwrap_or(0);

    let mut shifted: Grid = Vec::with_capacity(grid.len() + 2);
    shifted.push(Vec::new());
    shifted.push(Vec::new());
    put(&mut shifted, 0, 0, AVERAGES_TITLE);
    for col in 0..ncols {
        if let Some(avg) = column_average(&grid, col) {
            put(&mut shifted, 1, col, avg.to_string());
        }
    }
    shifted.extend(grid);

    write_grid(&mut book, sheet_name, &shifted)?;

    let sheet = book.get_sheet_by_name_mut(sheet_name).ok_or_else(|| {
        PowerMeterError::Persistence(format!("sheet '{sheet_name}' not found"))
    })?;
    style_title(sheet, ncols as u32);

    save(&book, workbook)?;
    info!("averages added to '{sheet_name}' across {ncols} columns");
    Ok(())
}

/// Compute `(8760/1000) * (off*0.15 + shortidle*0.45 + longidle*0.1 +
/// sleep*0.3)` from the four named columns' averages and write it under a
/// "Total Annual Power" header, overwriting that column when it already
/// exists.
///
/// Requires [`add_averages`] to have run first; fails naming any of the four
/// columns that cannot be found, leaving the sheet unmodified.
pub fn add_total_annual_power(workbook: &Path, sheet_name: &str) -> Result<()> {
    let mut book = load_existing(workbook)?;
    let sheet = book.get_sheet_by_name(sheet_name).ok_or_else(|| {
        PowerMeterError::Persistence(format!("sheet '{sheet_name}' not found"))
    })?;

    if sheet.get_value((1, 1)) != AVERAGES_TITLE {
        return Err(PowerMeterError::Precondition(
            "averages missing: run the averages calculation first".into(),
        ));
    }

    let ncols = sheet.get_highest_column();
    let mut total = 0.0;
    let mut missing = Vec::new();
    for (name, weight) in WEIGHTS {
        match find_column(sheet, ncols, name) {
            Some(col) => {
                let raw = sheet.get_value((col, AVERAGES_ROW));
                let avg = raw.parse::<f64>().map_err(|_| {
                    PowerMeterError::Precondition(format!(
                        "average for column '{name}' is not numeric (found '{raw}')"
                    ))
                })?;
                total += avg * weight;
            }
            None => missing.push(name),
        }
    }
    if !missing.is_empty() {
        return Err(PowerMeterError::Precondition(format!(
            "required columns not found: {}",
            missing.join(", ")
        )));
    }
    let total = ANNUAL_KILO_HOURS * total;

    let target = find_column(sheet, ncols, TOTAL_ANNUAL_POWER_HEADER).unwrap_or(ncols + 1);

    let sheet = book.get_sheet_by_name_mut(sheet_name).ok_or_else(|| {
        PowerMeterError::Persistence(format!("sheet '{sheet_name}' not found"))
    })?;
    sheet
        .get_cell_mut((target, HEADER_ROW))
        .set_value(TOTAL_ANNUAL_POWER_HEADER);
    sheet
        .get_cell_mut((target, AVERAGES_ROW))
        .set_value_number(total);
    let header_ref = format!("{}{HEADER_ROW}", column_letter(target));
    sheet.get_style_mut(header_ref.as_str()).get_font_mut().set_bold(true);

    save(&book, workbook)?;
    info!("total annual power {total:.3} written to '{sheet_name}'");
    Ok(())
}

/// Mean of the column's parseable values across the data rows, or `None`
/// when the column holds no numbers.
fn column_average(grid: &Grid, col: usize) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for row in grid.iter().skip(1) {
        if let Some(value) = row.get(col) {
            if let Ok(n) = value.parse::<f64>() {
                sum += n;
                count += 1;
            }
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Case-insensitive, space-insensitive header lookup in the header row.
fn find_column(sheet: &Worksheet, ncols: u32, name: &str) -> Option<u32> {
    let wanted = normalize(name);
    (1..=ncols).find(|&col| normalize(&sheet.get_value((col, HEADER_ROW))) == wanted)
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Spanning title across all data columns: merged, bold, centered, bordered.
fn style_title(sheet: &mut Worksheet, ncols: u32) {
    if ncols > 1 {
        sheet.add_merge_cells(format!("A1:{}1", column_letter(ncols)));
    }
    let style = sheet.get_style_mut("A1");
    style.get_font_mut().set_bold(true);
    style
        .get_alignment_mut()
        .set_horizontal(HorizontalAlignmentValues::Center);
    style
        .get_borders_mut()
        .get_bottom_mut()
        .set_border_style(Border::BORDER_THIN);
}
