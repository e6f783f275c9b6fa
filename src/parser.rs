//! Event-log parsing.
//!
//! [`LogParser`] streams one event log line by line through the
//! [`StateMachine`] and folds the resulting [`Effect`]s into a [`JobOutcome`].
//! The record patterns recognized inside a log are exposed as small matching
//! functions so the state machine can gate them on the current state.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{CheckLogsError, Result};
use crate::state_machine::{
    Diagnostic, Effect, JobOutcome, LifecycleState, MemoryUsage, ReturnValue, StateMachine,
};

/// `(return value 0)`, `(signal 9)` and the like, anywhere on a line.
static RETURN_VALUE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]+) (\d+)\)").unwrap());

/// Date field following the event code and the `(cluster.proc.subproc)` id.
static DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{3} \([0-9.]+\) (\d+/\d+ \d+:\d+:\d+)(?:\s|$)").unwrap()
});

/// Three-column `Memory (MB) : used request allocated` row.
static MEMORY_SUMMARY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Memory \(MB\)\s+:\s*(\d+)\s+(\d+)\s+(\d+)\s*$").unwrap()
});

/// `50  -  MemoryUsage of job (MB)` row of an image-size update.
static MEMORY_UPDATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s+-\s+MemoryUsage of job \(([A-Za-z]+)\)\s*$").unwrap()
});

pub fn match_return_value(line: &str) -> Option<ReturnValue> {
    let caps = RETURN_VALUE_REGEX.captures(line)?;
    // Digits only, so parsing fails on overflow alone; keep it a failure code.
    Some(ReturnValue {
        kind: caps[1].to_string(),
        code: caps[2].parse().unwrap_or(i64::MAX),
    })
}

pub fn match_date(line: &str) -> Option<&str> {
    DATE_REGEX
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn match_memory_summary(line: &str) -> Option<MemoryUsage> {
    let caps = MEMORY_SUMMARY_REGEX.captures(line)?;
    Some(MemoryUsage::new(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}

pub fn match_memory_update(line: &str) -> Option<u64> {
    MEMORY_UPDATE_REGEX.captures(line)?[1].parse().ok()
}

/// Options affecting how strictly a log is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Report a state change without a date as a diagnostic instead of failing.
    pub lenient_dates: bool,
}

/// Outcome of one event log together with the anomalies found in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedLog {
    pub path: PathBuf,
    pub outcome: JobOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogParser {
    options: ParserOptions,
}

impl LogParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedLog> {
        let file = File::open(path).map_err(|source| CheckLogsError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_reader(BufReader::new(file), path)
    }

    /// Replays an already opened log. `path` is only used for reporting.
    pub fn parse_reader<R: BufRead>(&self, mut reader: R, path: &Path) -> Result<ParsedLog> {
        let mut replay = Replay::new(self.options);
        let mut buf = Vec::new();
        let mut line_no = 0;
        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| CheckLogsError::FileOpen {
                    path: path.to_path_buf(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            line_no += 1;
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Err(line) = replay.feed(line_no, line) {
                return Err(CheckLogsError::MissingDate {
                    path: path.to_path_buf(),
                    line,
                });
            }
        }
        let (outcome, diagnostics) = replay.finish();
        Ok(ParsedLog {
            path: path.to_path_buf(),
            outcome,
            diagnostics,
        })
    }
}

/// Data accumulated for the run attempt currently being replayed.
struct Replay {
    options: ParserOptions,
    state: LifecycleState,
    date: Option<String>,
    termination: Option<ReturnValue>,
    memory: Option<MemoryUsage>,
    observations: Vec<u64>,
    diagnostics: Vec<Diagnostic>,
}

impl Replay {
    fn new(options: ParserOptions) -> Self {
        Self {
            options,
            state: LifecycleState::Unknown,
            date: None,
            termination: None,
            memory: None,
            observations: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Applies one line. Fails with the line number when a state change has
    /// no date in strict mode.
    fn feed(&mut self, line_no: usize, line: &str) -> std::result::Result<(), usize> {
        let transition = StateMachine::next(self.state, line);
        if transition.event.is_some() {
            match match_date(line) {
                Some(date) => self.date = Some(date.to_string()),
                None if self.options.lenient_dates => {
                    self.diagnostics.push(Diagnostic::MissingDate { line: line_no });
                }
                None => return Err(line_no),
            }
        }
        self.state = transition.state;

        match transition.effect {
            Effect::None => {}
            Effect::CaptureReturn(ret) => {
                self.termination = Some(ret);
                self.observations.clear();
            }
            Effect::CaptureMemory(memory) => self.memory = Some(memory),
            Effect::ObserveMemory(value) => self.observations.push(value),
            Effect::ClearHistory => {
                self.memory = None;
                self.observations.clear();
            }
        }
        Ok(())
    }

    fn finish(mut self) -> (JobOutcome, Vec<Diagnostic>) {
        if self.state == LifecycleState::Unknown {
            self.diagnostics.push(Diagnostic::InvalidLogFile);
        }

        let (exit_kind, exit_code) = match self.termination {
            Some(ret) => (Some(ret.kind), Some(ret.code)),
            None => {
                if self.state == LifecycleState::Terminated {
                    self.diagnostics.push(Diagnostic::MissingReturnCode);
                }
                (None, None)
            }
        };

        let memory = match (self.memory, self.observations.iter().max()) {
            (Some(memory), _) => memory,
            (None, Some(&peak)) => MemoryUsage::from_peak(peak),
            (None, None) => {
                // Fast successful jobs may never log a final memory row.
                let reports_memory = matches!(
                    self.state,
                    LifecycleState::Terminated | LifecycleState::Evicted
                );
                if reports_memory && exit_code != Some(0) {
                    self.diagnostics.push(Diagnostic::MissingMemoryRecord { state: self.state });
                }
                MemoryUsage::default()
            }
        };

        let outcome = JobOutcome {
            state: self.state,
            date: self.date,
            exit_kind,
            exit_code,
            memory,
        };
        (outcome, self.diagnostics)
    }
}
