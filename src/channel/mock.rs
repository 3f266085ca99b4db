//! Scripted mock channel for testing without physical hardware.
//!
//! The mock replays a script of replies, simulates the query round-trip
//! latency, and counts opens/queries/closes so tests can verify resource
//! handling (in particular that a run closes its channel exactly once).

use super::{ChannelError, ChannelOpener, DeviceChannel, Sample};
use crate::error::{PowerMeterError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// One scripted step. The script repeats from the start once exhausted, so a
/// short script can feed an arbitrarily long run.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A well-formed text response.
    Reply(String),
    /// The device answered with nothing.
    Empty,
    /// One query fails; the loop is expected to skip and continue.
    CommFailure,
    /// The link dies; the loop is expected to stop with partial samples.
    Drop,
}

pub struct MockChannel {
    script: Vec<MockReply>,
    cursor: usize,
    roundtrip: Duration,
    queries: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockChannel {
    pub fn new(roundtrip: Duration, script: Vec<MockReply>) -> Self {
        Self {
            script,
            cursor: 0,
            roundtrip,
            queries: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter incremented once per query, shared with the test.
    pub fn query_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.queries)
    }

    /// Counter incremented once per close, shared with the test.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl DeviceChannel for MockChannel {
    fn query(&mut self, _command: &[u8]) -> std::result::Result<Sample, ChannelError> {
        thread::sleep(self.roundtrip);
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.script.is_empty() {
            return Ok(Sample::from_raw(Vec::new()));
        }
        let step = self.script[self.cursor % self.script.len()].clone();
        self.cursor += 1;
        match step {
            MockReply::Reply(text) => Ok(Sample::from_raw(text.into_bytes())),
            MockReply::Empty => Ok(Sample::from_raw(Vec::new())),
            MockReply::CommFailure => {
                Err(ChannelError::Communication("scripted query failure".into()))
            }
            MockReply::Drop => Err(ChannelError::Disconnected("scripted link drop".into())),
        }
    }

    fn close(self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opener handing out [`MockChannel`]s, with optional open failure and a log
/// of when each channel was opened (for scheduling assertions).
pub struct MockOpener {
    script: Vec<MockReply>,
    roundtrip: Duration,
    fail_open: bool,
    opened_at: Arc<Mutex<Vec<Instant>>>,
    closes: Arc<AtomicUsize>,
}

impl MockOpener {
    pub fn new(roundtrip: Duration, script: Vec<MockReply>) -> Self {
        Self {
            script,
            roundtrip,
            fail_open: false,
            opened_at: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every `open` fail with a connection error.
    pub fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Instants at which channels were opened, shared with the test.
    pub fn open_log(&self) -> Arc<Mutex<Vec<Instant>>> {
        Arc::clone(&self.opened_at)
    }

    /// Total closes across every channel this opener produced.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl ChannelOpener for MockOpener {
    type Channel = MockChannel;

    fn open(&self) -> Result<MockChannel> {
        if self.fail_open {
            return Err(PowerMeterError::Connection(
                "scripted open failure".into(),
            ));
        }
        if let Ok(mut log) = self.opened_at.lock() {
            log.push(Instant::now());
        }
        let mut channel = MockChannel::new(self.roundtrip, self.script.clone());
        channel.closes = Arc::clone(&self.closes);
        Ok(channel)
    }
}
