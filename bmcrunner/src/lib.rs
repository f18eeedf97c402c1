//! bmcrunner - Serialized, bounded task execution for BMC fleets
//!
//! This library schedules slow, fragile operations against out-of-band
//! management controllers (power, boot device, users, resets). Operations
//! against the same controller never overlap; operations against different
//! controllers run in parallel under a global ceiling.
//!
//! # High-Level API
//!
//! The [`taskrunner`] module provides the scheduler facade:
//!
//! ```ignore
//! use bmcrunner::config::ConfigFile;
//! use bmcrunner::repository::MemoryRepository;
//! use bmcrunner::taskrunner::{Action, RunnerConfig, TaskRunner};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let file = ConfigFile::load()?;
//! let runner = TaskRunner::new(
//!     Arc::new(MemoryRepository::new()),
//!     RunnerConfig::from(&file.runner),
//! );
//! runner.start(CancellationToken::new())?;
//!
//! let id = runner.execute("power cycle", "10.0.0.5", Action::new(|_| async {
//!     Ok("cycled".to_string())
//! }));
//! ```

pub mod config;
pub mod logging;
pub mod repository;
pub mod taskrunner;

/// Version of the bmcrunner library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
