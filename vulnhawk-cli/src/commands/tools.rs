//! `vulnhawk tools check` command handler

use std::io::Write;

use serde::Serialize;

use vulnhawk_core::config::VulnhawkConfig;
use vulnhawk_scan_engine::adapter::resolve_binary;
use vulnhawk_scan_engine::config::ScanEngineConfig;

use crate::cli::ToolsAction;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `tools` command.
pub fn execute(
    action: ToolsAction,
    config: &VulnhawkConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match action {
        ToolsAction::Check => check(config, writer),
    }
}

/// Installation hint shown when a tool binary cannot be resolved.
pub fn install_hint(tool: &str) -> &'static str {
    match tool {
        "syft" => "brew install syft, or see https://github.com/anchore/syft#installation",
        "osv-scanner" => {
            "go install github.com/google/osv-scanner/cmd/osv-scanner@v1, or brew install osv-scanner"
        }
        _ => "install the tool and ensure it is on PATH, or set the path in vulnhawk.toml",
    }
}

fn check(config: &VulnhawkConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let engine_config = ScanEngineConfig::from_core(&config.scan);

    let tools = [
        ("syft", &engine_config.sbom_tool_path),
        ("osv-scanner", &engine_config.vuln_tool_path),
    ];

    let mut report = ToolsReport {
        tools: Vec::new(),
        all_available: true,
    };
    for (name, configured) in tools {
        let resolved = resolve_binary(configured);
        if resolved.is_none() {
            report.all_available = false;
        }
        report.tools.push(ToolStatus {
            name: name.to_owned(),
            configured_path: configured.display().to_string(),
            resolved_path: resolved.map(|p| p.display().to_string()),
            install_hint: install_hint(name).to_owned(),
        });
    }

    writer.render(&report)?;

    if !report.all_available {
        let missing: Vec<&str> = report
            .tools
            .iter()
            .filter(|t| t.resolved_path.is_none())
            .map(|t| t.name.as_str())
            .collect();
        return Err(CliError::ToolMissing(missing.join(", ")));
    }
    Ok(())
}

#[derive(Serialize)]
pub struct ToolsReport {
    pub tools: Vec<ToolStatus>,
    pub all_available: bool,
}

#[derive(Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub configured_path: String,
    pub resolved_path: Option<String>,
    pub install_hint: String,
}

impl Render for ToolsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "{:<14} {:<10} Path", "Tool", "Status")?;
        writeln!(w, "{}", "-".repeat(60))?;

        for tool in &self.tools {
            match &tool.resolved_path {
                Some(path) => {
                    writeln!(w, "{:<14} {:<10} {}", tool.name, "ok".green(), path)?;
                }
                None => {
                    writeln!(
                        w,
                        "{:<14} {:<10} {} (not found)",
                        tool.name,
                        "missing".red().bold(),
                        tool.configured_path
                    )?;
                    writeln!(w, "{:<14} hint: {}", "", tool.install_hint)?;
                }
            }
        }
        Ok(())
    }
}

/// Preflight helper used by `scan`: fail fast with an install hint
/// before submitting a job.
pub fn preflight(engine_config: &ScanEngineConfig) -> Result<(), CliError> {
    for (name, path) in [
        ("syft", &engine_config.sbom_tool_path),
        ("osv-scanner", &engine_config.vuln_tool_path),
    ] {
        if resolve_binary(path).is_none() {
            return Err(CliError::ToolMissing(format!(
                "{} ({}) -- try: {}",
                name,
                path.display(),
                install_hint(name)
            )));
        }
    }
    Ok(())
}
