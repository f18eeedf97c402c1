//! Task runner configuration.
//!
//! This module contains the [`RunnerConfig`] struct and related constants.

use std::time::Duration;

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default ceiling on simultaneously active per-host workers.
pub const DEFAULT_MAX_WORKERS: usize = 1000;

/// Default time a worker stays resident with no new work.
pub const DEFAULT_WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between runner status reports.
pub const DEFAULT_REPORTER_INTERVAL: Duration = Duration::from_secs(3);

// =============================================================================
// Runner Configuration
// =============================================================================

/// Configuration for the task runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Maximum number of per-host workers running at the same time.
    ///
    /// Bounds concurrent BMC sessions across the fleet. Zero is treated as one.
    pub max_workers: usize,

    /// How long a per-host worker waits for new work before exiting.
    ///
    /// A later task for the same host admits a fresh worker.
    pub worker_idle_timeout: Duration,

    /// Interval between debug-level runner status reports.
    pub reporter_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            worker_idle_timeout: DEFAULT_WORKER_IDLE_TIMEOUT,
            reporter_interval: DEFAULT_REPORTER_INTERVAL,
        }
    }
}

impl RunnerConfig {
    /// Sets the worker ceiling.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Sets the worker idle timeout.
    pub fn with_worker_idle_timeout(mut self, timeout: Duration) -> Self {
        self.worker_idle_timeout = timeout;
        self
    }

    /// Sets the status report interval.
    pub fn with_reporter_interval(mut self, interval: Duration) -> Self {
        self.reporter_interval = interval;
        self
    }

    /// Returns the worker ceiling, clamped to at least one.
    pub(crate) fn effective_max_workers(&self) -> usize {
        if self.max_workers == 0 {
            tracing::warn!("max_workers is 0, clamping to 1");
            1
        } else {
            self.max_workers
        }
    }

    /// Returns the status report interval, with zero replaced by the default.
    pub(crate) fn effective_reporter_interval(&self) -> Duration {
        if self.reporter_interval.is_zero() {
            tracing::warn!(
                default_ms = DEFAULT_REPORTER_INTERVAL.as_millis(),
                "reporter_interval is 0, using the default"
            );
            DEFAULT_REPORTER_INTERVAL
        } else {
            self.reporter_interval
        }
    }
}

impl From<&crate::config::RunnerSettings> for RunnerConfig {
    fn from(settings: &crate::config::RunnerSettings) -> Self {
        Self {
            max_workers: settings.max_workers,
            worker_idle_timeout: settings.worker_idle_timeout,
            reporter_interval: settings.reporter_interval,
        }
    }
}
