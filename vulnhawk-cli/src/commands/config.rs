//! `vulnhawk config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use vulnhawk_core::config::VulnhawkConfig;

use crate::cli::ConfigAction;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `config` command.
///
/// `validate` reads the file strictly (a missing file is an error);
/// `show` prints the effective configuration the other commands run
/// with, including env overrides and defaults.
pub async fn execute(
    action: ConfigAction,
    config_path: &Path,
    effective: &VulnhawkConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match action {
        ConfigAction::Validate => {
            VulnhawkConfig::from_file(config_path)
                .await
                .map_err(|e| CliError::Config(e.to_string()))?;
            writer.render(&ValidationReport {
                path: config_path.display().to_string(),
                valid: true,
            })?;
            Ok(())
        }
        ConfigAction::Show { section } => {
            let payload = build_config_report(config_path, effective, section.as_deref())?;
            writer.render(&payload)?;
            Ok(())
        }
    }
}

fn build_config_report(
    config_path: &Path,
    config: &VulnhawkConfig,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let rendered = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("scan") => toml::to_string_pretty(&config.scan),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: general, scan)"
            )));
        }
    }
    .map_err(|e| CliError::Command(format!("failed to serialize config: {e}")))?;

    Ok(ConfigReport {
        path: config_path.display().to_string(),
        section: section.map(|s| s.to_owned()),
        rendered,
    })
}

#[derive(Serialize)]
pub struct ValidationReport {
    pub path: String,
    pub valid: bool,
}

impl Render for ValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;
        writeln!(w, "{}: {}", self.path, "OK".green().bold())?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub path: String,
    pub section: Option<String>,
    pub rendered: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "# effective configuration ({})", self.path)?;
        write!(w, "{}", self.rendered)?;
        Ok(())
    }
}
