//! # powermeter
//!
//! Polls a power-measurement instrument over a serial link at fixed
//! intervals for configured durations, accumulates the readings per named
//! test run, and writes them into a spreadsheet report augmented with
//! derived statistics.
//!
//! ## Crate Structure
//!
//! - **`cancel`**: cooperative cancellation token observed by the sampling
//!   and scheduling loops.
//! - **`channel`**: the device boundary: `DeviceChannel`/`ChannelOpener`
//!   traits, the `serialport` implementation, and a scripted mock.
//! - **`config`**: YAML-backed `Settings` (serial parameters, logging,
//!   report defaults, the test-sequence table).
//! - **`error`**: the central `PowerMeterError` enum.
//! - **`menu`**: interactive menu and the live progress pane.
//! - **`report`**: workbook persistence (`store`) and derived statistics
//!   (`calc`: per-column averages, Total Annual Power).
//! - **`sampler`**: the timed polling loop against one channel.
//! - **`scheduler`**: sequencing of test runs against a shared global clock
//!   with scheduled start offsets and operator pauses.
//!
//! The whole tool is a single logical thread of control: the scheduler
//! drives one sampling run at a time to completion, and no two device
//! sessions are open concurrently.

pub mod cancel;
pub mod channel;
pub mod config;
pub mod error;
pub mod menu;
pub mod report;
pub mod sampler;
pub mod scheduler;
