//! bmcrunner CLI - Command-line interface
//!
//! This binary exercises the bmcrunner task runner and manages its
//! configuration file.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::load::LoadArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "bmcrunner")]
#[command(about = "Serialized, bounded task execution for BMC fleets", long_about = None)]
#[command(version = bmcrunner::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run synthetic BMC actions through the task runner
    Load(LoadArgs),

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print the version
    Version,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Load(args) => commands::load::run(args),
        Commands::Config { command } => commands::config::run(command),
        Commands::Version => {
            println!("bmcrunner {}", bmcrunner::VERSION);
            Ok(())
        }
    };

    if let Err(e) = result {
        e.exit();
    }
}
