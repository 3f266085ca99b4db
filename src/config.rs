//! Configuration management.
//!
//! Settings are loaded from a YAML document under `config/` via the `config`
//! crate. The document supplies the serial connection parameters, the logging
//! section, the report defaults, and the ordered test-sequence table.

use crate::error::{PowerMeterError, Result};
use config::Config;
use log::warn;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub serial: SerialSettings,
    pub logging: LoggingSettings,
    #[serde(default)]
    pub report: ReportSettings,
    #[serde(default)]
    pub tests: Vec<TestEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SerialSettings {
    pub port: String,
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    #[serde(default = "default_bytesize")]
    pub bytesize: u8,
    #[serde(default = "default_stopbits")]
    pub stopbits: u8,
    /// Read timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSettings {
    #[serde(default = "default_workbook")]
    pub workbook: String,
    #[serde(default = "default_sheet")]
    pub sheet: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            workbook: default_workbook(),
            sheet: default_sheet(),
        }
    }
}

/// One entry of the test-sequence table.
///
/// All fields are optional at the parsing level; [`TestEntry::resolve`]
/// decides whether the entry is runnable and logs what is missing.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TestEntry {
    /// Report column header, also the display name of the run.
    pub header: Option<String>,
    /// Scheduled start offset from sequence launch. Absent means "start as
    /// soon as the previous test finished".
    pub start: Option<TimeSpec>,
    pub duration: Option<TimeSpec>,
    #[serde(default)]
    pub pause_after: bool,
    /// Per-test workbook path overriding the report default.
    pub output: Option<String>,
}

/// A test entry with its time fields parsed and its required fields present.
#[derive(Debug, Clone)]
pub struct ResolvedTest {
    pub header: String,
    pub start_minutes: Option<f64>,
    pub duration_minutes: f64,
    pub pause_after: bool,
    pub output: Option<String>,
}

impl TestEntry {
    /// Check the entry for the fields a run requires. Returns `None` (after
    /// logging a warning) when the name or the duration is missing, so the
    /// scheduler can skip the entry without aborting the sequence.
    pub fn resolve(&self, index: usize) -> Option<ResolvedTest> {
        let header = match &self.header {
            Some(h) if !h.trim().is_empty() => h.clone(),
            _ => {
                warn!("test entry {index} has no header name; skipping");
                return None;
            }
        };
        let duration = match &self.duration {
            Some(d) => d.to_minutes(),
            None => {
                warn!("test '{header}' has no duration; skipping");
                return None;
            }
        };
        Some(ResolvedTest {
            header,
            start_minutes: self.start.as_ref().map(TimeSpec::to_minutes),
            duration_minutes: duration,
            pause_after: self.pause_after,
            output: self.output.clone(),
        })
    }
}

/// A duration or offset given either as decimal minutes or as an `M:SS`
/// string.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpec {
    Minutes(f64),
    Clock(String),
}

impl TimeSpec {
    /// Value in minutes. `M:SS` parses as `M + S/60`; a plain numeric string
    /// parses as decimal minutes. Any other form logs a warning and yields 0
    /// rather than aborting the sequence.
    pub fn to_minutes(&self) -> f64 {
        match self {
            TimeSpec::Minutes(m) => *m,
            TimeSpec::Clock(s) => {
                let text = s.trim();
                if let Some((min_part, sec_part)) = text.split_once(':') {
                    match (min_part.parse::<f64>(), sec_part.parse::<f64>()) {
                        (Ok(m), Ok(sec)) => m + sec / 60.0,
                        _ => {
                            warn!("malformed time value '{s}'; treating as 0 minutes");
                            0.0
                        }
                    }
                } else {
                    match text.parse::<f64>() {
                        Ok(m) => m,
                        Err(_) => {
                            warn!("malformed time value '{s}'; treating as 0 minutes");
                            0.0
                        }
                    }
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for TimeSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimeSpecVisitor;

        impl Visitor<'_> for TimeSpecVisitor {
            type Value = TimeSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("minutes as a number or an \"M:SS\" string")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<TimeSpec, E> {
                Ok(TimeSpec::Minutes(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<TimeSpec, E> {
                Ok(TimeSpec::Minutes(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<TimeSpec, E> {
                Ok(TimeSpec::Minutes(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<TimeSpec, E> {
                Ok(TimeSpec::Clock(v.to_owned()))
            }
        }

        deserializer.deserialize_any(TimeSpecVisitor)
    }
}

impl Settings {
    pub fn new(config_name: Option<&str>) -> Result<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path))
            .build()
            .map_err(PowerMeterError::Config)?;

        s.try_deserialize().map_err(PowerMeterError::Config)
    }
}

fn default_baudrate() -> u32 {
    38400
}

fn default_bytesize() -> u8 {
    8
}

fn default_stopbits() -> u8 {
    1
}

fn default_timeout() -> f64 {
    0.5
}

fn default_log_file() -> String {
    "powermeter.log".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_workbook() -> String {
    "power_data.xlsx".into()
}

fn default_sheet() -> String {
    "Power Data".into()
}
