//! Sequencing of named test runs against a shared global clock.
//!
//! Tests run strictly in declaration order. Each entry may carry a scheduled
//! start offset; the scheduler waits (polling at ~1 Hz, printing the
//! remaining time) until the global clock reaches it. Out-of-order offsets
//! are honored literally, so a later-declared test with an earlier offset
//! still waits for its predecessor to finish first.
//!
//! Every completed run's samples are committed to the report store before
//! the next run starts, bounding data loss from a crash to the in-progress
//! run.

use crate::cancel::CancelToken;
use crate::channel::{ChannelOpener, DEFAULT_QUERY_COMMAND};
use crate::config::TestEntry;
use crate::report::store::ReportStore;
use crate::sampler::{self, Progress};
use log::{error, info, warn};
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

/// Shared elapsed-time reference across a sequence of test runs.
///
/// Pauses are excluded by shifting the origin forward, so scheduled-offset
/// comparisons only see active (non-paused) time.
#[derive(Debug)]
pub struct GlobalClock {
    origin: Instant,
}

impl GlobalClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed().as_secs_f64() / 60.0
    }

    /// Shift the origin forward so `paused` no longer counts as elapsed.
    pub fn absorb_pause(&mut self, paused: Duration) {
        self.origin += paused;
    }
}

/// Blocking acknowledgment used by the pause-after flag.
pub trait Prompt {
    fn wait_for_ack(&mut self, message: &str);
}

/// Prompt on the operator's terminal; resumes on Enter.
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn wait_for_ack(&mut self, message: &str) {
        print!("{message}");
        let _ = io::stdout().flush();
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
    }
}

/// Per-sequence accounting returned to the caller.
#[derive(Debug, Default)]
pub struct SequenceSummary {
    /// Headers of runs that completed and were committed.
    pub completed: Vec<String>,
    /// Entries skipped for missing fields.
    pub skipped: usize,
    /// Headers whose results could not be persisted. These represent
    /// potential data loss and are also logged prominently.
    pub persist_failures: Vec<String>,
}

pub struct Scheduler<O: ChannelOpener, P: Prompt> {
    opener: O,
    prompt: P,
    command: Vec<u8>,
    /// Poll interval of the start-offset wait loop. ~1 Hz in production;
    /// injectable so tests can shrink it.
    poll_interval: Duration,
}

impl<O: ChannelOpener, P: Prompt> Scheduler<O, P> {
    pub fn new(opener: O, prompt: P) -> Self {
        Self {
            opener,
            prompt,
            command: DEFAULT_QUERY_COMMAND.to_vec(),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_command(mut self, command: impl Into<Vec<u8>>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Drive the whole sequence: wait for each entry's start offset, sample
    /// for its duration, commit the samples, honor its pause flag.
    ///
    /// Failures local to one test (open failure, skipped entry, persistence
    /// error) never abort the sequence; user cancellation does. Every
    /// failure mode is reported through the summary, so the sequence itself
    /// is infallible.
    pub fn run_sequence(
        &mut self,
        tests: &[TestEntry],
        store: &ReportStore,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(&Progress<'_>),
    ) -> SequenceSummary {
        let mut clock = GlobalClock::start();
        let mut summary = SequenceSummary::default();

        for (index, entry) in tests.iter().enumerate() {
            let Some(test) = entry.resolve(index) else {
                summary.skipped += 1;
                continue;
            };

            if let Some(offset) = test.start_minutes {
                self.wait_for_start(&clock, offset, &test.header, cancel);
            }
            if cancel.is_cancelled() {
                warn!("sequence cancelled before test '{}'", test.header);
                break;
            }

            let channel = match self.opener.open() {
                Ok(channel) => channel,
                Err(e) => {
                    error!("cannot open device for test '{}': {e}", test.header);
                    continue;
                }
            };

            let outcome = sampler::run(
                channel,
                &test.header,
                test.duration_minutes,
                &self.command,
                Some(&clock),
                cancel,
                &mut on_progress,
            );
            if let Some(fault) = &outcome.fault {
                error!("test '{}' ended on fault: {fault}", test.header);
            }

            // Commit immediately; never batch across runs.
            if outcome.samples.is_empty() {
                warn!("test '{}' collected no samples; nothing to record", test.header);
            } else {
                let target = match &test.output {
                    Some(path) => store.with_workbook(path),
                    None => store.clone(),
                };
                match target.write_run_column(&test.header, &outcome.samples) {
                    Ok(written) => {
                        info!(
                            "recorded {} samples for '{}' ({} coercion failures)",
                            written.rows_written, test.header, written.coercion_failures
                        );
                        summary.completed.push(test.header.clone());
                    }
                    Err(e) => {
                        error!(
                            "POSSIBLE DATA LOSS: results for '{}' could not be persisted: {e}",
                            test.header
                        );
                        summary.persist_failures.push(test.header.clone());
                    }
                }
            }

            if outcome.interrupted {
                break;
            }

            if test.pause_after && !cancel.is_cancelled() {
                let pause_started = Instant::now();
                self.prompt.wait_for_ack(&format!(
                    "\nTest '{}' complete. Press Enter to continue...",
                    test.header
                ));
                let paused = pause_started.elapsed();
                clock.absorb_pause(paused);
                info!(
                    "resumed after {:.2} min pause; global clock recalibrated",
                    paused.as_secs_f64() / 60.0
                );
            }
        }

        summary
    }

    fn wait_for_start(
        &self,
        clock: &GlobalClock,
        offset_minutes: f64,
        header: &str,
        cancel: &CancelToken,
    ) {
        let mut waited = false;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            // One clock read per iteration; the remaining time is checked
            // before it is turned into a sleep, so it can never be negative.
            let remaining_min = offset_minutes - clock.elapsed_minutes();
            if remaining_min <= 0.0 {
                break;
            }
            print!("\rWaiting to start '{header}': {remaining_min:.2} min remaining   ");
            let _ = io::stdout().flush();
            waited = true;

            let remaining = Duration::from_secs_f64(remaining_min * 60.0);
            std::thread::sleep(self.poll_interval.min(remaining));
        }
        if waited {
            println!();
        }
    }
}
