//! Default values and constants for all configuration settings.
//!
//! Runner defaults are shared with [`crate::taskrunner::RunnerConfig`] so the
//! file and the library can never disagree.

use super::file::config_directory;
use super::settings::*;
use crate::taskrunner::{
    DEFAULT_MAX_WORKERS, DEFAULT_REPORTER_INTERVAL, DEFAULT_WORKER_IDLE_TIMEOUT,
};

/// Default number of status records kept in memory.
pub const DEFAULT_REPOSITORY_CAPACITY: usize = 100_000;

/// Default log file name, placed under `<config dir>/logs/`.
pub const DEFAULT_LOG_FILE_NAME: &str = "bmcrunner.log";

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            worker_idle_timeout: DEFAULT_WORKER_IDLE_TIMEOUT,
            reporter_interval: DEFAULT_REPORTER_INTERVAL,
        }
    }
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            capacity: Some(DEFAULT_REPOSITORY_CAPACITY),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: config_directory().join("logs").join(DEFAULT_LOG_FILE_NAME),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            runner: RunnerSettings::default(),
            repository: RepositorySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_runner_defaults_match_library() {
        let settings = RunnerSettings::default();
        assert_eq!(settings.max_workers, 1000);
        assert_eq!(settings.worker_idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.reporter_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_log_file_under_config_dir() {
        let logging = LoggingSettings::default();
        assert!(logging.file.starts_with(config_directory()));
        assert!(logging.file.ends_with("logs/bmcrunner.log"));
    }
}
