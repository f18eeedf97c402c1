//! CLI runner for common setup and operations.
//!
//! Encapsulates configuration loading, logging initialization and task
//! runner construction so command handlers stay small.

use crate::error::CliError;
use bmcrunner::config::ConfigFile;
use bmcrunner::logging::{init_logging, split_log_path, LoggingGuard};
use bmcrunner::repository::{MemoryRepository, StatusRepository};
use bmcrunner::taskrunner::{RunnerConfig, TaskRunner, TelemetrySink};
use std::sync::Arc;
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Load config and initialize logging.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    /// * `stdout` - When true, log lines are mirrored to stdout
    pub fn new(debug_mode: bool, stdout: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(&log_dir, &log_file, stdout, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("bmcrunner v{}", bmcrunner::VERSION);
        info!("bmcrunner CLI: {} command", command);
    }

    /// Build the status repository described by the config file.
    pub fn create_repository(&self) -> Arc<dyn StatusRepository> {
        match self.config.repository.capacity {
            Some(capacity) => Arc::new(MemoryRepository::with_capacity(capacity)),
            None => Arc::new(MemoryRepository::new()),
        }
    }

    /// Build a task runner reporting to `telemetry`.
    pub fn create_task_runner(
        &self,
        config: RunnerConfig,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> TaskRunner {
        TaskRunner::with_telemetry(self.create_repository(), config, telemetry)
    }
}
