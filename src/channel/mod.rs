//! Device channel boundary.
//!
//! The instrument is reached through the [`DeviceChannel`] capability trait
//! (query/close) plus a [`ChannelOpener`] that produces a fresh channel per
//! test run. Alternate transports (the scripted mock, a TCP-wrapped serial
//! bridge) substitute behind the same contract, so the sampling and
//! scheduling logic never touches `serialport` directly.

pub mod mock;
pub mod serial;

use crate::error::PowerMeterError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Wire command sent to the power meter on every poll. The response is
/// treated as opaque text; no protocol decoding happens here.
pub const DEFAULT_QUERY_COMMAND: &[u8] = b"?MPOW";

/// One decoded reading from the instrument.
///
/// Immutable once captured; ordered by capture time within a test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Response bytes exactly as read from the device.
    pub raw: Vec<u8>,
    /// Space-separated hex rendering of the raw bytes, for logging.
    pub hex: String,
    /// Trimmed text rendering; what ends up in the report.
    pub text: String,
    pub captured_at: DateTime<Utc>,
}

impl Sample {
    pub fn from_raw(raw: Vec<u8>) -> Self {
        let text = String::from_utf8_lossy(&raw).trim().to_string();
        let hex = raw
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            raw,
            hex,
            text,
            captured_at: Utc::now(),
        }
    }

    /// True when the device returned nothing useful for this poll.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Failure classes a channel can report per query.
///
/// The split matters to the sampling loop: a [`ChannelError::Communication`]
/// skips one sample and keeps polling, a [`ChannelError::Disconnected`] ends
/// the run with whatever was collected so far.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("communication error: {0}")]
    Communication(String),

    #[error("connection lost: {0}")]
    Disconnected(String),
}

impl From<ChannelError> for PowerMeterError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Communication(msg) => PowerMeterError::Communication(msg),
            ChannelError::Disconnected(msg) => PowerMeterError::Connection(msg),
        }
    }
}

/// An open bidirectional link to one instrument.
pub trait DeviceChannel {
    /// Send one command and read back one response.
    fn query(&mut self, command: &[u8]) -> Result<Sample, ChannelError>;

    /// Release the link. Consumes the channel so a run can close it exactly
    /// once; dropping an unclosed channel releases the transport as well.
    fn close(self);
}

/// Factory for channels, one per test run.
pub trait ChannelOpener {
    type Channel: DeviceChannel;

    fn open(&self) -> crate::error::Result<Self::Channel>;
}
