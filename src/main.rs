use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use condor_checklogs::cli::{Cli, read_paths};
use condor_checklogs::config::CheckLogsConfig;
use condor_checklogs::logging::setup_logging;
use condor_checklogs::{LogParser, LogScanner, ParserOptions, Reporter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Printed directly so `RUST_LOG=off` cannot hide why we failed.
            eprintln!("{}", fatal_message(&err));
            ExitCode::FAILURE
        }
    }
}

fn fatal_message(err: &anyhow::Error) -> String {
    format!("error: {err:#}")
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => CheckLogsConfig::load_from(path)?,
        None => CheckLogsConfig::load()?,
    };

    let paths = if cli.logfiles.is_empty() {
        read_paths(io::stdin().lock()).context("failed to read log paths from stdin")?
    } else {
        cli.logfiles.clone()
    };

    let options = cli.report_options(&config);
    let parser = LogParser::new(ParserOptions {
        lenient_dates: cli.lenient_dates || config.lenient_dates,
    });
    let scanner = LogScanner::new(parser, cli.workers(&config));
    debug!(
        "Checking {} logs with {} workers",
        paths.len(),
        scanner.workers()
    );

    let mut reporter = Reporter::new(options);
    let mut stdout = io::stdout();
    scanner
        .scan(paths, |result| {
            match result {
                Ok(parsed) => {
                    if let Some(line) = reporter.record(&parsed)? {
                        writeln!(stdout, "{line}")?;
                    }
                }
                Err(err) => reporter.record_failure(err)?,
            }
            Ok(())
        })
        .await?;

    let (sorted, summary) = reporter.finish();
    for line in sorted {
        writeln!(stdout, "{line}")?;
    }
    writeln!(stdout, "{}", summary.render(options.json))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use condor_checklogs::CheckLogsError;
    use std::path::PathBuf;

    #[test]
    fn fatal_message_includes_cause_chain() {
        let err = anyhow::Error::new(CheckLogsError::MissingDate {
            path: PathBuf::from("/logs/job.log"),
            line: 3,
        })
        .context("scan aborted");
        assert_eq!(
            fatal_message(&err),
            "error: scan aborted: State change without date at /logs/job.log:3"
        );
    }
}
