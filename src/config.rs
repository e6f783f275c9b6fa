//! Configuration loaded from `condor-checklogs.toml`.
//!
//! [`CheckLogsConfig`] holds the settings that are not worth a flag on every
//! invocation. Missing keys fall back to defaults. The
//! `CONDOR_CHECKLOGS_WORKERS` environment variable takes precedence over the
//! file; command-line flags take precedence over both.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "condor-checklogs.toml";
pub const WORKERS_ENV: &str = "CONDOR_CHECKLOGS_WORKERS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckLogsConfig {
    /// Parser threads; 0 picks the number of available CPUs.
    #[serde(default)]
    pub workers: usize,

    /// Skip unreadable files and undatable entries instead of aborting.
    #[serde(default)]
    pub ignore_errors: bool,

    /// Warn instead of failing on a state change without a date.
    #[serde(default)]
    pub lenient_dates: bool,
}

impl CheckLogsConfig {
    /// Loads `condor-checklogs.toml` from the current directory.
    /// Uses defaults if the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        let config = if path.exists() {
            Self::read(path)?
        } else {
            Self::default()
        };
        config.with_env_overrides()
    }

    /// Loads an explicitly named file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::read(path)?.with_env_overrides()
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(WORKERS_ENV)
            && !value.is_empty()
        {
            self.workers = value
                .parse()
                .with_context(|| format!("{WORKERS_ENV} must be a number, got {value:?}"))?;
        }
        Ok(self)
    }

    /// Worker count with the CPU-count default applied.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }
}
