//! Configuration file support for `~/.bmcrunner/config.ini`.
//!
//! The file is plain INI with one section per concern:
//!
//! ```ini
//! [runner]
//! max_workers = 1000
//! worker_idle_timeout = 30s
//! reporter_interval = 3s
//!
//! [repository]
//! capacity = 100000
//!
//! [logging]
//! file = ~/.bmcrunner/logs/bmcrunner.log
//! ```
//!
//! Missing files and missing keys fall back to defaults. Settings structs live
//! in `settings`, constants in `defaults`, parsing in `parser` and
//! serialization in `writer`.
//!
//! # Example
//!
//! ```ignore
//! use bmcrunner::config::ConfigFile;
//! use bmcrunner::taskrunner::RunnerConfig;
//!
//! let file = ConfigFile::load()?;
//! let runner_config = RunnerConfig::from(&file.runner);
//! ```

mod defaults;
mod duration;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{DEFAULT_LOG_FILE_NAME, DEFAULT_REPOSITORY_CAPACITY};
pub use duration::{format_duration, parse_duration, DurationParseError};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, LoggingSettings, RepositorySettings, RunnerSettings};
