use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::state::LifecycleState;

/// Event logs carry no year; dates are placed in this (leap) year so that
/// `02/29` stays valid and ordering within a log is preserved.
pub const REFERENCE_YEAR: i32 = 2000;

/// Format of the date field on state-change lines.
pub const DATE_FORMAT: &str = "%m/%d %H:%M:%S";

/// Parses a `MM/DD HH:MM:SS` date field.
pub fn parse_log_date(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(&format!("{REFERENCE_YEAR}/{raw}"), "%Y/%m/%d %H:%M:%S")
}

/// Exit annotation of a terminated run, e.g. `(return value 0)` or `(signal 9)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnValue {
    pub kind: String,
    pub code: i64,
}

/// Memory figures in megabytes: used, the middle (request) column and allocated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used: Option<u64>,
    pub mid: Option<u64>,
    pub allocated: Option<u64>,
}

impl MemoryUsage {
    pub fn new(used: u64, mid: u64, allocated: u64) -> Self {
        Self {
            used: Some(used),
            mid: Some(mid),
            allocated: Some(allocated),
        }
    }

    /// Peak of interim samples standing in for a missing summary.
    pub fn from_peak(peak: u64) -> Self {
        Self {
            used: Some(peak),
            ..Self::default()
        }
    }

    pub fn is_known(&self) -> bool {
        self.used.is_some() || self.mid.is_some() || self.allocated.is_some()
    }

    /// `Some(true)` when usage exceeded the allocation, `None` if either is unknown.
    pub fn exceeded(&self) -> Option<bool> {
        Some(self.used? > self.allocated?)
    }
}

/// Final classification of one event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub state: LifecycleState,
    /// Raw `MM/DD HH:MM:SS` field of the last state-changing line.
    pub date: Option<String>,
    pub exit_kind: Option<String>,
    pub exit_code: Option<i64>,
    pub memory: MemoryUsage,
}

impl JobOutcome {
    pub fn timestamp(&self) -> Result<Option<NaiveDateTime>, chrono::ParseError> {
        self.date.as_deref().map(parse_log_date).transpose()
    }

    pub fn succeeded(&self) -> bool {
        self.state == LifecycleState::Terminated && self.exit_code == Some(0)
    }

    pub(crate) fn date_or_unknown(&self) -> &str {
        self.date.as_deref().unwrap_or("unknown date")
    }
}

/// Anomalies found while replaying a log. None of them abort parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// No recognized event code in the whole file.
    InvalidLogFile,
    /// The job terminated but no return value was reported.
    MissingReturnCode,
    /// The job terminated or was evicted without any memory figures.
    MissingMemoryRecord { state: LifecycleState },
    /// A state-change line without its date field.
    MissingDate { line: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::InvalidLogFile => write!(f, "invalid log file"),
            Diagnostic::MissingReturnCode => write!(f, "could not match the return value code"),
            Diagnostic::MissingMemoryRecord { state } => {
                write!(f, "could not match the memory amounts ({state})")
            }
            Diagnostic::MissingDate { line } => {
                write!(f, "state change without date at line {line}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_log_date() {
        let ts = parse_log_date("04/12 13:05:42").unwrap();
        assert_eq!(ts.year(), REFERENCE_YEAR);
        assert_eq!((ts.month(), ts.day()), (4, 12));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (13, 5, 42));
        assert_eq!(ts.format(DATE_FORMAT).to_string(), "04/12 13:05:42");
    }

    #[test]
    fn leap_day_is_accepted() {
        assert!(parse_log_date("02/29 00:00:00").is_ok());
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(parse_log_date("13/01 00:00:00").is_err());
        assert!(parse_log_date("04/12 25:00:00").is_err());
    }

    #[test]
    fn memory_exceeded_requires_both_figures() {
        assert_eq!(MemoryUsage::new(900, 1000, 800).exceeded(), Some(true));
        assert_eq!(MemoryUsage::new(800, 1000, 800).exceeded(), Some(false));
        assert_eq!(MemoryUsage::from_peak(80).exceeded(), None);
        assert!(!MemoryUsage::default().is_known());
    }

    #[test]
    fn outcome_timestamp() {
        let outcome = JobOutcome {
            date: Some("01/02 03:04:05".into()),
            ..Default::default()
        };
        assert_eq!(
            outcome.timestamp().unwrap(),
            Some(parse_log_date("01/02 03:04:05").unwrap())
        );
        assert_eq!(JobOutcome::default().timestamp().unwrap(), None);
    }

    #[test]
    fn diagnostic_display() {
        assert_eq!(
            Diagnostic::MissingMemoryRecord {
                state: LifecycleState::Evicted
            }
            .to_string(),
            "could not match the memory amounts (evicted)"
        );
        assert_eq!(
            Diagnostic::MissingDate { line: 3 }.to_string(),
            "state change without date at line 3"
        );
    }
}
