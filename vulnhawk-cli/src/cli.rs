//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's
//! derive macros. It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Vulnhawk -- SBOM vulnerability scan orchestrator.
///
/// Use `vulnhawk <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "vulnhawk", version, about, long_about = None)]
pub struct Cli {
    /// Path to the vulnhawk.toml configuration file.
    #[arg(short, long, default_value = "vulnhawk.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a one-shot vulnerability scan.
    Scan(ScanArgs),

    /// Check that the external scan tools are installed.
    Tools(ToolsArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan ----

/// Run a one-shot scan on a directory or a container image.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directory to scan (default: current directory).
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Scan a container image reference instead of a directory.
    #[arg(long, conflicts_with = "path")]
    pub image: Option<String>,

    /// Minimum severity to include in the report
    /// (unknown, low, medium, high, critical).
    #[arg(long, default_value = "unknown")]
    pub min_severity: String,
}

// ---- tools ----

/// Check external tool availability.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub action: ToolsAction,
}

#[derive(Subcommand, Debug)]
pub enum ToolsAction {
    /// Verify that the configured SBOM and vulnerability tools resolve
    /// to executable binaries.
    Check,
}

// ---- config ----

/// Manage vulnhawk configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, scan).
        #[arg(long)]
        section: Option<String>,
    },
}
