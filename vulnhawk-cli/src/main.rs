//! vulnhawk -- SBOM vulnerability scan orchestrator CLI
//!
//! Entry point: parses arguments, loads configuration, initializes
//! logging, and dispatches to the subcommand handlers in `commands/`.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::Path;

use clap::Parser;

use vulnhawk_core::config::VulnhawkConfig;
use vulnhawk_core::error::{ConfigError, VulnhawkError};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

const DEFAULT_CONFIG_PATH: &str = "vulnhawk.toml";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli.config).await?;
    logging::init_tracing(&config.general, cli.log_level.as_deref())?;

    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Scan(args) => commands::scan::execute(args, &config, &writer).await,
        Commands::Tools(args) => commands::tools::execute(args.action, &config, &writer),
        Commands::Config(args) => {
            commands::config::execute(args.action, &cli.config, &config, &writer).await
        }
    }
}

/// Load the effective configuration.
///
/// A missing file at the *default* path is not an error: the CLI runs
/// on defaults plus env overrides. An explicitly passed path must
/// exist.
async fn load_config(path: &Path) -> Result<VulnhawkConfig, CliError> {
    match VulnhawkConfig::load(path).await {
        Ok(config) => Ok(config),
        Err(VulnhawkError::Config(ConfigError::FileNotFound { .. }))
            if path == Path::new(DEFAULT_CONFIG_PATH) =>
        {
            // tracing is not initialized yet at this point
            eprintln!(
                "note: {} not found, using defaults and env overrides",
                path.display()
            );
            let mut config = VulnhawkConfig::default();
            config.apply_env_overrides();
            config.validate().map_err(|e| CliError::Config(e.to_string()))?;
            Ok(config)
        }
        Err(e) => Err(CliError::Config(e.to_string())),
    }
}
