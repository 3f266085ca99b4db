//! Custom error types for the application.
//!
//! This module defines the primary error type, `PowerMeterError`, for the
//! entire application. Using the `thiserror` crate, it provides a centralized
//! and consistent way to handle the different failure classes the tool can
//! hit, from device I/O to report persistence.
//!
//! The propagation policy is deliberately forgiving: failures local to one
//! sample or one test never abort a whole test sequence, while failures that
//! risk losing already-collected data (a report write that cannot complete)
//! are surfaced prominently to the caller.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type Result<T> = std::result::Result<T, PowerMeterError>;

#[derive(Error, Debug)]
pub enum PowerMeterError {
    /// Configuration file could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but a value is semantically invalid.
    #[error("Configuration entry invalid: {0}")]
    Configuration(String),

    /// The device link could not be opened, or was lost mid-run.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single query to the device failed; the sampling loop may continue.
    #[error("Communication error: {0}")]
    Communication(String),

    /// The report workbook could not be read back or rewritten.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// An operation was requested before its prerequisite step ran.
    #[error("Precondition not met: {0}")]
    Precondition(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
