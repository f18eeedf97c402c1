//! Configuration management CLI commands.
//!
//! Provides `config show`, `config init` and `config path` for inspecting
//! and creating the configuration file.

use bmcrunner::config::{config_file_path, format_duration, ConfigFile};
use clap::Subcommand;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration (file values over defaults)
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init { force } => run_init(force),
        ConfigCommands::Path => run_path(),
    }
}

/// Show the effective configuration.
fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load()?;

    println!("Configuration Settings");
    println!("======================");
    if path.exists() {
        println!("Source: {}", path.display());
    } else {
        println!("Source: defaults (no file at {})", path.display());
    }
    println!();

    for line in render(&config) {
        println!("{}", line);
    }

    Ok(())
}

/// Render settings as `[section]` / `key = value` lines.
fn render(config: &ConfigFile) -> Vec<String> {
    let capacity = config
        .repository
        .capacity
        .map(|c| c.to_string())
        .unwrap_or_else(|| "(unbounded)".to_string());

    vec![
        "[runner]".to_string(),
        format!("  max_workers = {}", config.runner.max_workers),
        format!(
            "  worker_idle_timeout = {}",
            format_duration(config.runner.worker_idle_timeout)
        ),
        format!(
            "  reporter_interval = {}",
            format_duration(config.runner.reporter_interval)
        ),
        String::new(),
        "[repository]".to_string(),
        format!("  capacity = {}", capacity),
        String::new(),
        "[logging]".to_string(),
        format!("  file = {}", config.logging.file.display()),
    ]
}

/// Write a default configuration file.
fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    if ConfigFile::init_at(&path, force)? {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!("Configuration file already exists at {}", path.display());
        println!("Use --force to overwrite it with defaults.");
    }
    Ok(())
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
