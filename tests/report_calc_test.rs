//! Report calculator: averages layout, idempotence, and Total Annual Power.

use powermeter::channel::Sample;
use powermeter::error::PowerMeterError;
use powermeter::report::calc::{
    add_averages, add_total_annual_power, AVERAGES_TITLE, TOTAL_ANNUAL_POWER_HEADER,
};
use powermeter::report::store::ReportStore;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SHEET: &str = "Power Data";

fn samples(texts: &[&str]) -> Vec<Sample> {
    texts
        .iter()
        .map(|t| Sample::from_raw(t.as_bytes().to_vec()))
        .collect()
}

fn grid_snapshot(path: &Path) -> Vec<Vec<String>> {
    let book = umya_spreadsheet::reader::xlsx::read(path).expect("workbook readable");
    let sheet = book.get_sheet_by_name(SHEET).expect("sheet present");
    let rows = sheet.get_highest_row();
    let cols = sheet.get_highest_column();
    (1..=rows)
        .map(|r| (1..=cols).map(|c| sheet.get_value((c, r))).collect())
        .collect()
}

fn cell(path: &Path, col: u32, row: u32) -> String {
    let book = umya_spreadsheet::reader::xlsx::read(path).expect("workbook readable");
    let sheet = book.get_sheet_by_name(SHEET).expect("sheet present");
    sheet.get_value((col, row))
}

fn cell_f64(path: &Path, col: u32, row: u32) -> f64 {
    cell(path, col, row).parse().expect("numeric cell")
}

/// Four-column report with known averages: off=5, shortidle=20, longidle=3,
/// sleep=1.
fn four_column_report(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("report.xlsx");
    let store = ReportStore::new(&path, SHEET);
    store
        .write_run_column("Off", &samples(&["4.0", "5.0", "6.0"]))
        .expect("off");
    store
        .write_run_column("Short Idle", &samples(&["19.0", "21.0"]))
        .expect("shortidle");
    store
        .write_run_column("Long Idle", &samples(&["3.0", "3.0", "3.0"]))
        .expect("longidle");
    store
        .write_run_column("Sleep", &samples(&["1.0"]))
        .expect("sleep");
    path
}

#[test]
fn averages_shift_data_down_and_fill_row_two() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("report.xlsx");
    let store = ReportStore::new(&path, SHEET);
    store
        .write_run_column("TestA", &samples(&["10.1", "10.3", "bad", "10.5"]))
        .expect("write");

    add_averages(&path, SHEET).expect("averages succeed");

    assert_eq!(cell(&path, 1, 1), AVERAGES_TITLE);
    // Mean ignores the missing-value marker: (10.1 + 10.3 + 10.5) / 3.
    assert!((cell_f64(&path, 1, 2) - 10.3).abs() < 1e-9);
    assert_eq!(cell(&path, 1, 3), "TestA");
    assert_eq!(cell(&path, 1, 4), "10.1");
    assert_eq!(cell(&path, 1, 7), "10.5");
}

#[test]
fn averages_title_is_merged_across_data_columns() {
    let dir = TempDir::new().expect("tempdir");
    let path = four_column_report(&dir);

    add_averages(&path, SHEET).expect("averages succeed");

    let book = umya_spreadsheet::reader::xlsx::read(&path).expect("workbook readable");
    let sheet = book.get_sheet_by_name(SHEET).expect("sheet present");
    let merges: Vec<String> = sheet
        .get_merge_cells()
        .iter()
        .map(|range| range.get_range())
        .collect();
    assert!(
        merges.iter().any(|range| range == "A1:D1"),
        "expected A1:D1 merge, found {merges:?}"
    );
}

#[test]
fn averages_applied_twice_is_a_no_op() {
    let dir = TempDir::new().expect("tempdir");
    let path = four_column_report(&dir);

    add_averages(&path, SHEET).expect("first application");
    let first = grid_snapshot(&path);
    add_averages(&path, SHEET).expect("second application");
    let second = grid_snapshot(&path);

    assert_eq!(first, second, "second call must not restructure the sheet");
    assert_ne!(
        cell(&path, 1, 2),
        AVERAGES_TITLE,
        "no duplicate header rows"
    );
}

#[test]
fn total_annual_power_matches_the_weighted_sum() {
    let dir = TempDir::new().expect("tempdir");
    let path = four_column_report(&dir);

    add_averages(&path, SHEET).expect("averages");
    add_total_annual_power(&path, SHEET).expect("total annual power");

    assert_eq!(cell(&path, 5, 3), TOTAL_ANNUAL_POWER_HEADER);
    // 8.76 * (5*0.15 + 20*0.45 + 3*0.1 + 1*0.3) = 90.666
    assert!((cell_f64(&path, 5, 2) - 90.666).abs() < 1e-9);
}

#[test]
fn total_annual_power_requires_averages_first() {
    let dir = TempDir::new().expect("tempdir");
    let path = four_column_report(&dir);

    let before = grid_snapshot(&path);
    let err = add_total_annual_power(&path, SHEET).expect_err("must fail without averages");
    assert!(matches!(err, PowerMeterError::Precondition(_)));
    assert_eq!(grid_snapshot(&path), before, "sheet left unmodified");
}

#[test]
fn missing_sleep_column_is_reported_by_name() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("report.xlsx");
    let store = ReportStore::new(&path, SHEET);
    store
        .write_run_column("Off", &samples(&["5.0"]))
        .expect("off");
    store
        .write_run_column("Short Idle", &samples(&["20.0"]))
        .expect("shortidle");
    store
        .write_run_column("Long Idle", &samples(&["3.0"]))
        .expect("longidle");

    add_averages(&path, SHEET).expect("averages");
    let before = grid_snapshot(&path);

    let err = add_total_annual_power(&path, SHEET).expect_err("sleep column is missing");
    let message = err.to_string();
    assert!(message.contains("sleep"), "unexpected message: {message}");
    assert!(!message.contains("shortidle"), "only missing columns named");
    assert_eq!(grid_snapshot(&path), before, "sheet left unmodified");
}

#[test]
fn total_annual_power_twice_updates_in_place() {
    let dir = TempDir::new().expect("tempdir");
    let path = four_column_report(&dir);

    add_averages(&path, SHEET).expect("averages");
    add_total_annual_power(&path, SHEET).expect("first");
    add_total_annual_power(&path, SHEET).expect("second");

    let book = umya_spreadsheet::reader::xlsx::read(&path).expect("workbook readable");
    let sheet = book.get_sheet_by_name(SHEET).expect("sheet present");
    assert_eq!(
        sheet.get_highest_column(),
        5,
        "second invocation must not append another column"
    );
    assert!((cell_f64(&path, 5, 2) - 90.666).abs() < 1e-9);
}

#[test]
fn header_match_is_case_and_space_insensitive() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("report.xlsx");
    let store = ReportStore::new(&path, SHEET);
    store
        .write_run_column("OFF", &samples(&["5.0"]))
        .expect("off");
    store
        .write_run_column("short_idle", &samples(&["20.0"]))
        .expect("shortidle");
    store
        .write_run_column("LongIdle", &samples(&["3.0"]))
        .expect("longidle");
    store
        .write_run_column("SLEEP ", &samples(&["1.0"]))
        .expect("sleep");

    add_averages(&path, SHEET).expect("averages");
    add_total_annual_power(&path, SHEET).expect("headers found despite casing");

    assert!((cell_f64(&path, 5, 2) - 90.666).abs() < 1e-9);
}
