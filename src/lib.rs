//! Classifier for HTCondor job event logs.
//!
//! Each log is replayed through a small state machine to find out how the
//! last run of the job ended: still running, evicted, aborted, disconnected,
//! or terminated with an exit code and memory figures. The outcomes of a
//! batch of logs are then bucketed and summarized.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod parser;
pub mod report;
pub mod state_machine;

pub use error::{CheckLogsError, Result};
pub use orchestrator::LogScanner;
pub use parser::{LogParser, ParsedLog, ParserOptions};
pub use report::{Bucket, ReportOptions, Reporter, Summary, classify, report};
pub use state_machine::{Diagnostic, EventCode, JobOutcome, LifecycleState, MemoryUsage};
