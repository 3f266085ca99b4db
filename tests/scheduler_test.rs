//! Sequencing behavior: start offsets, pauses, skips, and per-run commits.

use powermeter::cancel::CancelToken;
use powermeter::channel::mock::{MockOpener, MockReply};
use powermeter::config::{TestEntry, TimeSpec};
use powermeter::report::store::ReportStore;
use powermeter::scheduler::{Prompt, Scheduler};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const SHEET: &str = "Power Data";

/// Seconds expressed as the configuration's minute unit.
fn minutes(secs: f64) -> TimeSpec {
    TimeSpec::Minutes(secs / 60.0)
}

fn entry(header: &str, start_secs: Option<f64>, duration_secs: f64) -> TestEntry {
    TestEntry {
        header: Some(header.into()),
        start: start_secs.map(minutes),
        duration: Some(minutes(duration_secs)),
        pause_after: false,
        output: None,
    }
}

/// Acknowledges after a fixed delay, simulating the operator.
struct DelayedAck {
    delay: Duration,
    acks: Arc<AtomicUsize>,
}

impl DelayedAck {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            acks: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Prompt for DelayedAck {
    fn wait_for_ack(&mut self, _message: &str) {
        thread::sleep(self.delay);
        self.acks.fetch_add(1, Ordering::SeqCst);
    }
}

struct NoPause;

impl Prompt for NoPause {
    fn wait_for_ack(&mut self, _message: &str) {}
}

fn header_at(path: &Path, col: u32) -> String {
    let book = umya_spreadsheet::reader::xlsx::read(path).expect("workbook readable");
    let sheet = book.get_sheet_by_name(SHEET).expect("sheet present");
    sheet.get_value((col, 1))
}

#[test]
fn sequence_commits_every_completed_run() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("report.xlsx");
    let store = ReportStore::new(&path, SHEET);
    let opener = MockOpener::new(
        Duration::from_millis(10),
        vec![MockReply::Reply("10.0".into())],
    );
    let cancel = CancelToken::new();

    let tests = [
        entry("Off", None, 0.2),
        entry("Sleep", None, 0.2),
    ];
    let mut scheduler =
        Scheduler::new(opener, NoPause).with_poll_interval(Duration::from_millis(20));
    let summary = scheduler.run_sequence(&tests, &store, &cancel, |_| {});

    assert_eq!(summary.completed, vec!["Off".to_string(), "Sleep".to_string()]);
    assert_eq!(summary.skipped, 0);
    assert!(summary.persist_failures.is_empty());
    assert_eq!(header_at(&path, 1), "Off");
    assert_eq!(header_at(&path, 2), "Sleep");
}

#[test]
fn second_test_waits_for_its_start_offset() {
    let dir = TempDir::new().expect("tempdir");
    let store = ReportStore::new(dir.path().join("report.xlsx"), SHEET);
    let opener = MockOpener::new(
        Duration::from_millis(10),
        vec![MockReply::Reply("10.0".into())],
    );
    let open_log = opener.open_log();
    let cancel = CancelToken::new();

    // First test consumes ~0.3 s of the clock; the second is scheduled at
    // 1.2 s, so the scheduler must wait out the difference.
    let tests = [
        entry("Off", Some(0.0), 0.3),
        entry("Sleep", Some(1.2), 0.2),
    ];
    let launched = Instant::now();
    let mut scheduler =
        Scheduler::new(opener, NoPause).with_poll_interval(Duration::from_millis(20));
    scheduler.run_sequence(&tests, &store, &cancel, |_| {});

    let log = open_log.lock().expect("open log");
    assert_eq!(log.len(), 2);
    let second_start = log[1] - launched;
    assert!(
        second_start >= Duration::from_millis(1150),
        "second test started after {second_start:?}, before its 1.2 s offset"
    );
}

#[test]
fn pause_time_is_excluded_from_the_global_clock() {
    let dir = TempDir::new().expect("tempdir");
    let store = ReportStore::new(dir.path().join("report.xlsx"), SHEET);
    let opener = MockOpener::new(
        Duration::from_millis(10),
        vec![MockReply::Reply("10.0".into())],
    );
    let open_log = opener.open_log();
    let cancel = CancelToken::new();

    // Run (0.3 s) + pause (0.6 s), then a test scheduled at 0.5 s of active
    // time. With the pause absorbed, the scheduler still waits ~0.2 s after
    // the ack; without absorption it would start immediately.
    let prompt = DelayedAck::new(Duration::from_millis(600));
    let acks = Arc::clone(&prompt.acks);
    let mut first = entry("Off", Some(0.0), 0.3);
    first.pause_after = true;
    let tests = [first, entry("Sleep", Some(0.5), 0.2)];

    let launched = Instant::now();
    let mut scheduler =
        Scheduler::new(opener, prompt).with_poll_interval(Duration::from_millis(20));
    scheduler.run_sequence(&tests, &store, &cancel, |_| {});

    assert_eq!(acks.load(Ordering::SeqCst), 1);
    let log = open_log.lock().expect("open log");
    assert_eq!(log.len(), 2);
    let second_start = log[1] - launched;
    // Wall clock: ~0.3 s run + 0.6 s pause + ~0.2 s remaining wait.
    assert!(
        second_start >= Duration::from_millis(1050),
        "pause not excluded: second test started after {second_start:?}"
    );
}

#[test]
fn malformed_entries_are_skipped_without_aborting() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("report.xlsx");
    let store = ReportStore::new(&path, SHEET);
    let opener = MockOpener::new(
        Duration::from_millis(10),
        vec![MockReply::Reply("10.0".into())],
    );
    let cancel = CancelToken::new();

    let nameless = TestEntry {
        duration: Some(minutes(0.2)),
        ..TestEntry::default()
    };
    let durationless = TestEntry {
        header: Some("Short Idle".into()),
        ..TestEntry::default()
    };
    let tests = [nameless, durationless, entry("Off", None, 0.2)];

    let mut scheduler =
        Scheduler::new(opener, NoPause).with_poll_interval(Duration::from_millis(20));
    let summary = scheduler.run_sequence(&tests, &store, &cancel, |_| {});

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.completed, vec!["Off".to_string()]);
    assert_eq!(header_at(&path, 1), "Off");
}

#[test]
fn open_failure_skips_the_run_and_continues() {
    let dir = TempDir::new().expect("tempdir");
    let store = ReportStore::new(dir.path().join("report.xlsx"), SHEET);
    let opener = MockOpener::new(
        Duration::from_millis(10),
        vec![MockReply::Reply("10.0".into())],
    )
    .failing();
    let cancel = CancelToken::new();

    let tests = [entry("Off", None, 0.2), entry("Sleep", None, 0.2)];
    let mut scheduler =
        Scheduler::new(opener, NoPause).with_poll_interval(Duration::from_millis(20));
    let summary = scheduler.run_sequence(&tests, &store, &cancel, |_| {});

    assert!(summary.completed.is_empty());
    assert!(summary.persist_failures.is_empty());
    assert!(
        !store.workbook().exists(),
        "no samples collected, nothing written"
    );
}

#[test]
fn cancellation_during_the_start_wait_stops_the_sequence() {
    let dir = TempDir::new().expect("tempdir");
    let store = ReportStore::new(dir.path().join("report.xlsx"), SHEET);
    let opener = MockOpener::new(
        Duration::from_millis(10),
        vec![MockReply::Reply("10.0".into())],
    );
    let open_log = opener.open_log();
    let cancel = CancelToken::new();

    let canceller = {
        let token = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            token.cancel();
        })
    };

    // The only test is scheduled far in the future; cancellation must break
    // the wait loop and never open the channel.
    let tests = [entry("Off", Some(30.0), 0.2)];
    let started = Instant::now();
    let mut scheduler =
        Scheduler::new(opener, NoPause).with_poll_interval(Duration::from_millis(20));
    scheduler.run_sequence(&tests, &store, &cancel, |_| {});
    canceller.join().expect("canceller thread");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(open_log.lock().expect("open log").is_empty());
}
