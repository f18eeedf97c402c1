//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;
use std::time::Duration;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// Task runner settings
    pub runner: RunnerSettings,
    /// Status repository settings
    pub repository: RepositorySettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Task runner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Maximum number of per-host workers running at once.
    pub max_workers: usize,
    /// How long an idle per-host worker stays resident.
    pub worker_idle_timeout: Duration,
    /// Interval between status reports in the log.
    pub reporter_interval: Duration,
}

/// Status repository configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySettings {
    /// Maximum number of retained status records, oldest evicted first.
    /// `None` keeps every record.
    pub capacity: Option<usize>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
