//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use bmcrunner::config::ConfigFileError;
use bmcrunner::taskrunner::RunnerError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to create the async runtime
    Runtime(std::io::Error),
    /// Task runner error
    Runner(RunnerError),
    /// Invalid command-line argument
    InvalidArgument(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(_) = self {
            eprintln!();
            eprintln!("Check the configuration file with: bmcrunner config show");
            eprintln!("Or recreate it with defaults:     bmcrunner config init --force");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Runner(e) => write!(f, "Task runner error: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Runner(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<RunnerError> for CliError {
    fn from(e: RunnerError) -> Self {
        CliError::Runner(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CliError::Config("bad".to_string()).to_string(),
            "Configuration error: bad"
        );
        assert_eq!(
            CliError::from(RunnerError::AlreadyStarted).to_string(),
            "Task runner error: task runner already started"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err = CliError::from(ConfigFileError::InvalidValue {
            section: "runner".to_string(),
            key: "max_workers".to_string(),
            value: "0".to_string(),
            reason: "must be a positive integer".to_string(),
        });
        assert!(err.to_string().contains("runner.max_workers"));
    }
}
