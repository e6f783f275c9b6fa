//! Command-line interface based on clap.
//!
//! Defines [`Cli`] with the log paths and the reporting flags, and maps them
//! together with the loaded configuration onto [`ReportOptions`].

use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::Parser;

use crate::config::CheckLogsConfig;
use crate::report::{ReportOptions, Visibility};

/// Report HTCondor jobs whose last run failed, was evicted or has not finished.
#[derive(Debug, Parser)]
#[command(name = "condor-checklogs", version, about)]
pub struct Cli {
    /// Job event logs. Newline-separated paths are read from stdin when omitted.
    pub logfiles: Vec<PathBuf>,

    /// Also print jobs that terminated successfully.
    #[arg(short = 'a', long, conflicts_with = "terminated_only")]
    pub show_all: bool,

    /// Only print the terminated jobs.
    #[arg(short = 't', long)]
    pub terminated_only: bool,

    /// Report jobs that exceeded allocated memory.
    #[arg(short, long)]
    pub memory: bool,

    /// Sort by time.
    #[arg(short, long)]
    pub sort: bool,

    /// Skip unreadable logs and undatable entries instead of aborting.
    #[arg(short, long)]
    pub ignore_errors: bool,

    /// Number of logs parsed in parallel (default: number of CPUs).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Warn instead of failing when a state change has no date.
    #[arg(long)]
    pub lenient_dates: bool,

    /// Configuration file (default: ./condor-checklogs.toml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print one JSON object per reported log and a JSON summary.
    #[arg(long)]
    pub json: bool,

    /// Enable debug output on stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn report_options(&self, config: &CheckLogsConfig) -> ReportOptions {
        let visibility = if self.show_all {
            Visibility::ShowAll
        } else if self.terminated_only {
            Visibility::TerminatedOnly
        } else {
            Visibility::Default
        };
        ReportOptions {
            visibility,
            memory: self.memory,
            sort: self.sort,
            ignore_errors: self.ignore_errors || config.ignore_errors,
            json: self.json,
        }
    }

    pub fn workers(&self, config: &CheckLogsConfig) -> usize {
        self.jobs.unwrap_or_else(|| config.effective_workers())
    }
}

/// Reads one path per line, skipping blank lines.
pub fn read_paths<R: BufRead>(reader: R) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            paths.push(PathBuf::from(trimmed));
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_logfiles_and_flags() {
        let cli = Cli::parse_from(["condor-checklogs", "-m", "-s", "a.log", "b.log"]);
        assert_eq!(cli.logfiles, vec![PathBuf::from("a.log"), PathBuf::from("b.log")]);
        assert!(cli.memory);
        assert!(cli.sort);
        assert!(!cli.ignore_errors);

        let options = cli.report_options(&CheckLogsConfig::default());
        assert_eq!(options.visibility, Visibility::Default);
        assert!(options.memory && options.sort);
    }

    #[test]
    fn cli_accepts_no_logfiles() {
        let cli = Cli::parse_from(["condor-checklogs", "--ignore-errors"]);
        assert!(cli.logfiles.is_empty());
        assert!(cli.ignore_errors);
    }

    #[test]
    fn show_all_and_terminated_only_conflict() {
        let result = Cli::try_parse_from(["condor-checklogs", "-a", "-t", "x.log"]);
        assert!(result.is_err());
    }

    #[test]
    fn config_supplies_defaults() {
        let cli = Cli::parse_from(["condor-checklogs", "-t", "x.log"]);
        let config = CheckLogsConfig {
            workers: 3,
            ignore_errors: true,
            lenient_dates: false,
        };
        let options = cli.report_options(&config);
        assert_eq!(options.visibility, Visibility::TerminatedOnly);
        assert!(options.ignore_errors);
        assert_eq!(cli.workers(&config), 3);

        let cli = Cli::parse_from(["condor-checklogs", "-j", "8", "x.log"]);
        assert_eq!(cli.workers(&config), 8);
    }

    #[test]
    fn read_paths_skips_blank_lines() {
        let input = "a.log\n\n  b.log  \n";
        let paths = read_paths(input.as_bytes()).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.log"), PathBuf::from("b.log")]);
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
