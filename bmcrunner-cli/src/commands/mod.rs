//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (show, init, path)
//! - [`load`] - Synthetic load against the task runner

pub mod config;
pub mod load;
