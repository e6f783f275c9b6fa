use std::path::PathBuf;
use std::sync::Arc;

use log::debug;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{CheckLogsError, Result};
use crate::parser::{LogParser, ParsedLog};

/// Parses many event logs on a bounded worker pool.
///
/// Every file is parsed independently. Results are handed out in the order
/// the paths were given, whatever order the workers finish in.
pub struct LogScanner {
    parser: LogParser,
    workers: usize,
}

impl LogScanner {
    pub fn new(parser: LogParser, workers: usize) -> Self {
        Self {
            parser,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Parses `paths` and passes each result to `sink` in input order.
    ///
    /// The first error returned by `sink` ends the scan; parses still in
    /// flight are aborted and the error is returned.
    pub async fn scan<F>(&self, paths: Vec<PathBuf>, mut sink: F) -> Result<()>
    where
        F: FnMut(Result<ParsedLog>) -> Result<()>,
    {
        let permits = Arc::new(Semaphore::new(self.workers));
        let handles: Vec<JoinHandle<Result<ParsedLog>>> = paths
            .into_iter()
            .map(|path| self.spawn_parse(Arc::clone(&permits), path))
            .collect();

        let mut pending = handles.into_iter();
        while let Some(handle) = pending.next() {
            let result = handle
                .await
                .unwrap_or_else(|err| Err(CheckLogsError::Worker(err.to_string())));
            if let Err(err) = sink(result) {
                for handle in pending {
                    handle.abort();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Parses all `paths`, collecting one result per path in input order.
    pub async fn scan_all(&self, paths: Vec<PathBuf>) -> Vec<Result<ParsedLog>> {
        let mut results = Vec::with_capacity(paths.len());
        // The sink never fails, so neither does the scan.
        let _ = self
            .scan(paths, |result| {
                results.push(result);
                Ok(())
            })
            .await;
        results
    }

    fn spawn_parse(
        &self,
        permits: Arc<Semaphore>,
        path: PathBuf,
    ) -> JoinHandle<Result<ParsedLog>> {
        let parser = self.parser;
        tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|err| CheckLogsError::Worker(err.to_string()))?;
            debug!("Parsing {}", path.display());
            tokio::task::spawn_blocking(move || parser.parse_file(&path))
                .await
                .map_err(|err| CheckLogsError::Worker(err.to_string()))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportOptions, Visibility, report};
    use crate::state_machine::LifecycleState;
    use std::fs;

    fn write_log(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn terminated_log(minute: u32, code: i32) -> String {
        format!(
            "005 (1.000.000) 04/12 13:{minute:02}:00 Job terminated.\n\t(1) Normal termination (return value {code})\n"
        )
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..20)
            .map(|i| write_log(&dir, &format!("job{i}.log"), &terminated_log(i, i as i32)))
            .collect();

        let scanner = LogScanner::new(LogParser::default(), 4);
        let results = scanner.scan_all(paths.clone()).await;

        assert_eq!(results.len(), paths.len());
        for (i, (result, path)) in results.iter().zip(&paths).enumerate() {
            let parsed = result.as_ref().unwrap();
            assert_eq!(&parsed.path, path);
            assert_eq!(parsed.outcome.exit_code, Some(i as i64));
        }
    }

    #[tokio::test]
    async fn unreadable_file_fails_only_its_slot() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_log(&dir, "a.log", &terminated_log(1, 0)),
            dir.path().join("missing.log"),
            write_log(&dir, "b.log", "000 (2.000.000) 04/12 13:00:00 Job submitted\n"),
        ];

        let results = LogScanner::new(LogParser::default(), 2)
            .scan_all(paths)
            .await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CheckLogsError::FileOpen { .. })));
        assert_eq!(
            results[2].as_ref().unwrap().outcome.state,
            LifecycleState::Submitted
        );
    }

    #[tokio::test]
    async fn sink_error_stops_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            dir.path().join("missing.log"),
            write_log(&dir, "a.log", &terminated_log(1, 0)),
        ];

        let mut seen = 0;
        let err = LogScanner::new(LogParser::default(), 1)
            .scan(paths, |result| {
                seen += 1;
                result.map(|_| ())
            })
            .await
            .unwrap_err();

        assert_eq!(seen, 1);
        assert!(matches!(err, CheckLogsError::FileOpen { .. }));
    }

    #[tokio::test]
    async fn ignored_failures_still_count_towards_total() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_log(&dir, "a.log", &terminated_log(1, 1)),
            dir.path().join("missing.log"),
            write_log(&dir, "b.log", &terminated_log(2, 0)),
        ];
        let options = ReportOptions {
            visibility: Visibility::ShowAll,
            ignore_errors: true,
            ..Default::default()
        };

        let results = LogScanner::new(LogParser::default(), 3).scan_all(paths).await;
        let report = report(results, options).unwrap();

        assert_eq!(report.messages.len(), 2);
        assert!(report.messages[0].ends_with("a.log"));
        assert!(report.messages[1].ends_with("b.log"));
        assert_eq!(report.summary.to_string(), "1 failed, 0 not terminated (total: 3)");
    }

    #[test]
    fn worker_count_is_at_least_one() {
        assert_eq!(LogScanner::new(LogParser::default(), 0).workers(), 1);
    }
}
