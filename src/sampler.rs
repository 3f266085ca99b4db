//! Timed sampling loop against one device channel.
//!
//! [`run`] polls the instrument until the configured duration elapses. No
//! inter-sample delay is imposed beyond the channel's own query round-trip,
//! so the sampling rate is round-trip bound. One failed query skips one
//! sample and keeps polling; only a dead link or user cancellation ends the
//! run early, and both still return the samples collected so far.

use crate::cancel::CancelToken;
use crate::channel::{ChannelError, DeviceChannel, Sample};
use crate::error::PowerMeterError;
use crate::scheduler::GlobalClock;
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

/// Number of recent samples carried in each progress update for live display.
pub const ROLLING_WINDOW: usize = 15;

/// Live feedback forwarded to the caller after each captured sample.
pub struct Progress<'a> {
    pub test_header: &'a str,
    pub sample_count: usize,
    pub test_elapsed_min: f64,
    pub test_remaining_min: f64,
    /// Elapsed time on the shared sequence clock, when one is in effect.
    pub global_elapsed_min: Option<f64>,
    /// Up to the last [`ROLLING_WINDOW`] sample texts, oldest first.
    pub recent: &'a [String],
}

/// How a sampling run ended, along with everything it collected.
pub struct SamplerOutcome {
    pub samples: Vec<Sample>,
    /// Set when the user cancelled the run before its duration elapsed.
    pub interrupted: bool,
    /// Set when an unrecoverable channel fault ended the run.
    pub fault: Option<PowerMeterError>,
}

/// Poll `channel` with `command` for `duration_minutes`, returning the
/// ordered samples. Finite and not restartable; a new invocation is a new
/// run. The channel is closed on every exit path, exactly once.
pub fn run<C: DeviceChannel>(
    mut channel: C,
    test_header: &str,
    duration_minutes: f64,
    command: &[u8],
    clock: Option<&GlobalClock>,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(&Progress<'_>),
) -> SamplerOutcome {
    let started = Instant::now();
    let deadline = started + Duration::from_secs_f64(duration_minutes.max(0.0) * 60.0);
    let mut samples: Vec<Sample> = Vec::new();
    let mut recent: Vec<String> = Vec::with_capacity(ROLLING_WINDOW);
    let mut interrupted = false;
    let mut fault = None;

    info!("starting data collection: {duration_minutes:.2} minutes for test '{test_header}'");

    while Instant::now() < deadline {
        if cancel.is_cancelled() {
            warn!(
                "test '{test_header}' interrupted by user after {} samples",
                samples.len()
            );
            interrupted = true;
            break;
        }

        match channel.query(command) {
            Ok(sample) if !sample.is_empty() => {
                recent.push(sample.text.clone());
                if recent.len() > ROLLING_WINDOW {
                    recent.remove(0);
                }
                samples.push(sample);

                let elapsed_min = started.elapsed().as_secs_f64() / 60.0;
                on_progress(&Progress {
                    test_header,
                    sample_count: samples.len(),
                    test_elapsed_min: elapsed_min,
                    test_remaining_min: (duration_minutes - elapsed_min).max(0.0),
                    global_elapsed_min: clock.map(GlobalClock::elapsed_minutes),
                    recent: &recent,
                });
            }
            Ok(_) => {
                debug!("empty response from device; sample skipped");
            }
            Err(ChannelError::Communication(msg)) => {
                warn!("query failed, sample skipped: {msg}");
            }
            Err(err @ ChannelError::Disconnected(_)) => {
                error!("unrecoverable channel fault, ending run '{test_header}': {err}");
                fault = Some(err.into());
                break;
            }
        }
    }

    channel.close();
    info!(
        "data collection finished: {} samples for test '{test_header}'",
        samples.len()
    );

    SamplerOutcome {
        samples,
        interrupted,
        fault,
    }
}
