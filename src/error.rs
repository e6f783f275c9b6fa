use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckLogsError {
    #[error("Cannot read {}: {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State change without date at {}:{line}", .path.display())]
    MissingDate { path: PathBuf, line: usize },

    #[error("Cannot parse date {value:?} of {}", .path.display())]
    DateParse { path: PathBuf, value: String },

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckLogsError {
    /// Path of the log file the error belongs to, if it is file-scoped.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            CheckLogsError::FileOpen { path, .. }
            | CheckLogsError::MissingDate { path, .. }
            | CheckLogsError::DateParse { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub type Result<T, E = CheckLogsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_open_display_names_the_path() {
        let err = CheckLogsError::FileOpen {
            path: PathBuf::from("/tmp/job.log"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        };
        assert_eq!(err.to_string(), "Cannot read /tmp/job.log: No such file");
        assert_eq!(err.path(), Some(std::path::Path::new("/tmp/job.log")));
    }

    #[test]
    fn date_errors_display() {
        let err = CheckLogsError::MissingDate {
            path: PathBuf::from("a.log"),
            line: 4,
        };
        assert_eq!(err.to_string(), "State change without date at a.log:4");

        let err = CheckLogsError::DateParse {
            path: PathBuf::from("b.log"),
            value: "13/45 00:00:00".into(),
        };
        assert_eq!(err.to_string(), "Cannot parse date \"13/45 00:00:00\" of b.log");
        assert!(CheckLogsError::Worker("panic".into()).path().is_none());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CheckLogsError>();
    }
}
