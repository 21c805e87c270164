//! odfgen CLI tool.

use anyhow::Context;
use clap::{Parser, Subcommand};
use odfgen_engine::TaskDriver;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::clean::Strategy;

#[derive(Parser)]
#[command(name = "odfgen")]
#[command(about = "Generate OpenDocument files from templates in batches", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every job of a batch file
    Run {
        /// Path to the batch file
        #[arg(default_value = "batch.kdl")]
        path: PathBuf,
        /// Print the finished jobs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a batch file
    Validate {
        /// Path to the batch file
        #[arg(default_value = "batch.kdl")]
        path: PathBuf,
    },
    /// Recursively delete a file or directory
    Clean {
        /// Path to delete
        path: PathBuf,
        /// Deletion strategy
        #[arg(long, value_enum, default_value_t = Strategy::Sequential)]
        strategy: Strategy,
        /// Concurrent removals for the fan-out strategy [default: fan-out-width setting]
        #[arg(long)]
        width: Option<usize>,
        /// Batch file whose settings tune the deletion
        #[arg(long)]
        batch: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let driver = TaskDriver::new().context("Failed to start runtime")?;

    match cli.command {
        Commands::Run { path, json } => {
            driver.drive(commands::run::run_batch(&path, json))?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
        Commands::Clean {
            path,
            strategy,
            width,
            batch,
        } => {
            driver.drive(commands::clean::clean(
                &path,
                strategy,
                width,
                batch.as_deref(),
            ))?;
        }
    }

    Ok(())
}
