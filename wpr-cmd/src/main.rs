mod alert;
mod command_inspect;
mod command_mkgrid;
mod command_parse;
mod command_prune;
mod command_shear;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use wpr::config::Config;

/// Operational stages of the wind-profiler radar pipeline.
///
/// Each subcommand runs one long-lived stage loop. Stages communicate only
/// through their publish directories and are restartable at any point; the
/// on-disk persistent sets carry the exactly-once accounting across
/// restarts.
#[derive(Parser)]
#[command(version, about, long_about, disable_help_subcommand = true)]
struct Cli {
    /// Logging level filters, e.g., debug, info, warn, etc ...
    #[arg(short, long, default_value = "info")]
    logging: String,

    /// YAML pipeline configuration file.
    #[arg(short, long, value_name = "path", default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode raw station files into per-slot record sets.
    Parse {
        /// Config sub-tree selector: test or test_local.
        #[arg(value_name = "mode")]
        mode: Option<String>,
    },
    /// Grid per-slot record sets into published wind cubes.
    Mkgrid {
        /// Config sub-tree selector: test1 or test2.
        #[arg(value_name = "mode")]
        mode: Option<String>,
    },
    /// Derive vertical shear cubes from published wind cubes.
    Shear {
        /// Config sub-tree selector: test1 or test2.
        #[arg(value_name = "mode")]
        mode: Option<String>,
    },
    /// Delete published day directories past the retention window.
    Prune,
    /// Report standard slots with no published cube.
    Inspect,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::with_path(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::from(1);
        }
    };

    let result = match &cli.commands {
        Commands::Parse { mode } => command_parse::run(&config, mode.as_deref(), &cli.logging),
        Commands::Mkgrid { mode } => command_mkgrid::run(&config, mode.as_deref(), &cli.logging),
        Commands::Shear { mode } => command_shear::run(&config, mode.as_deref(), &cli.logging),
        Commands::Prune => command_prune::run(&config, &cli.logging),
        Commands::Inspect => command_inspect::run(&config, &cli.logging),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(wpr::Error::ConfigInvalid(reason)) = err.downcast_ref::<wpr::Error>() {
                eprintln!("config error: {reason}");
                return ExitCode::from(1);
            }
            error!("fatal: {err:?}");
            if let Some(email) = &config.email {
                alert::send(email, "wpr stage failed", &format!("{err:?}"));
            }
            ExitCode::from(2)
        }
    }
}
