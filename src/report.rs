//! Classification of parsed logs and the final report.
//!
//! [`classify`] maps one [`ParsedLog`] to a [`Bucket`] and an optional
//! display line. [`Reporter`] folds a stream of parsed logs into counters,
//! hands lines back for immediate printing or buffers them for
//! chronological output, and produces the closing [`Summary`].

use std::fmt;

use chrono::NaiveDateTime;
use log::warn;
use serde::Serialize;

use crate::error::{CheckLogsError, Result};
use crate::parser::ParsedLog;
use crate::state_machine::{Diagnostic, JobOutcome, LifecycleState};

/// Reporting category of one log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Ok,
    Failed,
    NotTerminated,
    Invalid,
}

/// Which successful or unfinished jobs get a line of their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Failures and unfinished jobs only.
    #[default]
    Default,
    /// Successful jobs as well.
    ShowAll,
    /// Terminated jobs only, successful ones included.
    TerminatedOnly,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub visibility: Visibility,
    /// Judge terminated jobs by memory usage instead of exit code.
    pub memory: bool,
    /// Buffer lines and print them ordered by event time.
    pub sort: bool,
    /// Log file-scoped errors and continue instead of aborting.
    pub ignore_errors: bool,
    /// Emit JSON objects instead of text lines.
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub bucket: Bucket,
    pub message: Option<String>,
    /// Memory figure that takes part in the batch maximum.
    pub peak_memory: Option<u64>,
}

pub fn classify(parsed: &ParsedLog, options: &ReportOptions) -> Classification {
    let outcome = &parsed.outcome;
    let path = parsed.path.display();
    let peak_memory = outcome.memory.used;

    let (bucket, message) = match outcome.state {
        LifecycleState::Unknown => (Bucket::Invalid, None),
        LifecycleState::Terminated if options.memory => {
            let memory = outcome.memory;
            match (memory.used, memory.allocated) {
                (Some(used), Some(allocated)) if used > allocated => (
                    Bucket::Failed,
                    Some(format!(
                        "Exceeded allocated memory! {used} > {allocated} (MB): {path}"
                    )),
                ),
                (Some(used), Some(allocated)) => (
                    Bucket::Ok,
                    Some(format!(
                        "OK: memory used {used} <= {allocated} memory allocated (MB): {path}"
                    )),
                ),
                _ => (
                    Bucket::Ok,
                    Some(format!(
                        "OK: memory usage unknown ({}): {path}",
                        outcome.date_or_unknown()
                    )),
                ),
            }
        }
        LifecycleState::Terminated => match outcome.exit_code {
            Some(0) => {
                let shown = options.visibility != Visibility::Default;
                (
                    Bucket::Ok,
                    shown.then(|| format!("OK ({}): {path}", outcome.date_or_unknown())),
                )
            }
            Some(code) => (
                Bucket::Failed,
                Some(format!(
                    "Termination with error at {}: {} {code:2} : {path}",
                    outcome.date_or_unknown(),
                    outcome.exit_kind.as_deref().unwrap_or("exit"),
                )),
            ),
            None => (
                Bucket::Failed,
                Some(format!(
                    "Termination with error at {}: unknown return value : {path}",
                    outcome.date_or_unknown()
                )),
            ),
        },
        state if state.is_ended() => {
            let message = if options.memory {
                ended_memory_message(outcome).map(|detail| format!("{detail}: {path}"))
            } else {
                Some(format!(
                    "Condor termination ({state} at {}): {path}",
                    outcome.date_or_unknown()
                ))
            };
            (Bucket::NotTerminated, message)
        }
        state => {
            let message = if options.visibility == Visibility::TerminatedOnly {
                None
            } else if options.memory {
                let peak = outcome
                    .memory
                    .used
                    .map_or_else(|| "unknown".to_string(), |used| used.to_string());
                Some(format!("Running (max_memory {peak} (MB)): {path}"))
            } else {
                Some(format!(
                    "Not terminated ({state} at {}): {path}",
                    outcome.date_or_unknown()
                ))
            };
            (Bucket::NotTerminated, message)
        }
    };

    Classification {
        bucket,
        message,
        peak_memory,
    }
}

fn ended_memory_message(outcome: &JobOutcome) -> Option<String> {
    let state = outcome.state;
    let used = outcome.memory.used?;
    let detail = match outcome.memory.allocated {
        Some(allocated) if used > allocated => {
            format!("max memory = {used} > {allocated} (MB) allocated, exceeded")
        }
        Some(allocated) => format!("max memory = {used} <= {allocated} (MB) allocated"),
        None => format!("max memory = {used} (MB)"),
    };
    Some(format!("Condor termination ({state}, {detail})"))
}

/// Closing counts of a reporting pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub failed: usize,
    pub not_terminated: usize,
    pub invalid: usize,
    pub total: usize,
    pub max_memory: Option<u64>,
    #[serde(skip)]
    memory_mode: bool,
}

impl Summary {
    pub fn render(&self, json: bool) -> String {
        if json {
            serde_json::to_string(self).unwrap_or_default()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.memory_mode {
            let max = self
                .max_memory
                .map_or_else(|| "none".to_string(), |max| max.to_string());
            write!(
                f,
                "{} exceeded, {} not terminated (max: {max} MB, total: {})",
                self.failed, self.not_terminated, self.total
            )
        } else {
            write!(
                f,
                "{} failed, {} not terminated (total: {})",
                self.failed, self.not_terminated, self.total
            )
        }
    }
}

/// JSON form of one reported file.
#[derive(Serialize)]
struct Entry<'a> {
    path: &'a std::path::Path,
    bucket: Bucket,
    message: &'a str,
    outcome: &'a JobOutcome,
}

/// Folds parsed logs into counters and display lines.
#[derive(Debug)]
pub struct Reporter {
    options: ReportOptions,
    failed: usize,
    not_terminated: usize,
    invalid: usize,
    total: usize,
    used_memory: Vec<u64>,
    buffered: Vec<(NaiveDateTime, String)>,
}

impl Reporter {
    pub fn new(options: ReportOptions) -> Self {
        Self {
            options,
            failed: 0,
            not_terminated: 0,
            invalid: 0,
            total: 0,
            used_memory: Vec::new(),
            buffered: Vec::new(),
        }
    }

    /// Records one parsed log and returns the line to print right away.
    ///
    /// In sort mode lines are buffered until [`Reporter::finish`]; a line
    /// whose timestamp cannot be parsed is fatal unless errors are ignored.
    pub fn record(&mut self, parsed: &ParsedLog) -> Result<Option<String>> {
        self.total += 1;
        for diagnostic in &parsed.diagnostics {
            match diagnostic {
                Diagnostic::InvalidLogFile => {
                    warn!("Invalid log file: {}", parsed.path.display())
                }
                other => warn!("{}: {other}", parsed.path.display()),
            }
        }

        let classification = classify(parsed, &self.options);
        match classification.bucket {
            Bucket::Failed => self.failed += 1,
            Bucket::NotTerminated => self.not_terminated += 1,
            Bucket::Invalid => self.invalid += 1,
            Bucket::Ok => {}
        }
        if let Some(used) = classification.peak_memory {
            self.used_memory.push(used);
        }

        let Some(message) = classification.message else {
            return Ok(None);
        };
        let line = if self.options.json {
            let entry = Entry {
                path: &parsed.path,
                bucket: classification.bucket,
                message: &message,
                outcome: &parsed.outcome,
            };
            serde_json::to_string(&entry).unwrap_or(message)
        } else {
            message
        };

        if !self.options.sort {
            return Ok(Some(line));
        }
        match parsed.outcome.timestamp() {
            Ok(Some(timestamp)) => self.buffered.push((timestamp, line)),
            Ok(None) | Err(_) => {
                let err = CheckLogsError::DateParse {
                    path: parsed.path.clone(),
                    value: parsed.outcome.date.clone().unwrap_or_default(),
                };
                if !self.options.ignore_errors {
                    return Err(err);
                }
                warn!("{err}; left out of the sorted output");
            }
        }
        Ok(None)
    }

    /// Counts a log that could not be parsed at all.
    pub fn record_failure(&mut self, err: CheckLogsError) -> Result<()> {
        self.total += 1;
        if !self.options.ignore_errors {
            return Err(err);
        }
        warn!("{err}; skipping");
        Ok(())
    }

    /// Buffered lines in chronological order, followed by the summary.
    pub fn finish(mut self) -> (Vec<String>, Summary) {
        // Stable, so equal timestamps keep their input order.
        self.buffered.sort_by_key(|(timestamp, _)| *timestamp);
        let lines = self.buffered.into_iter().map(|(_, line)| line).collect();
        let summary = Summary {
            failed: self.failed,
            not_terminated: self.not_terminated,
            invalid: self.invalid,
            total: self.total,
            max_memory: self.used_memory.iter().copied().max(),
            memory_mode: self.options.memory,
        };
        (lines, summary)
    }
}

/// Output of a whole reporting pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub messages: Vec<String>,
    pub summary: Summary,
}

/// Runs a complete pass over already parsed results, in input order.
pub fn report<I>(results: I, options: ReportOptions) -> Result<Report>
where
    I: IntoIterator<Item = Result<ParsedLog>>,
{
    let mut reporter = Reporter::new(options);
    let mut messages = Vec::new();
    for result in results {
        match result {
            Ok(parsed) => messages.extend(reporter.record(&parsed)?),
            Err(err) => reporter.record_failure(err)?,
        }
    }
    let (sorted, summary) = reporter.finish();
    messages.extend(sorted);
    Ok(Report { messages, summary })
}
