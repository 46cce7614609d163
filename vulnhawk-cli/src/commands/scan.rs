//! `vulnhawk scan` command handler

use std::io::Write;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use vulnhawk_core::config::VulnhawkConfig;
use vulnhawk_core::types::{Severity, Target};
use vulnhawk_scan_engine::config::ScanEngineConfig;
use vulnhawk_scan_engine::job::FailureKind;
use vulnhawk_scan_engine::orchestrator::{ReportStatus, ScanOrchestrator};
use vulnhawk_scan_engine::report::AggregatedReport;

use crate::cli::ScanArgs;
use crate::commands::tools;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    config: &VulnhawkConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let min_severity = parse_severity(&args.min_severity)?;
    let engine_config = ScanEngineConfig::from_core(&config.scan);

    // Fail fast with an install hint instead of consuming a job.
    tools::preflight(&engine_config)?;

    let target = match args.image {
        Some(reference) => Target::Image(reference),
        None => Target::Directory(args.path),
    };

    let orchestrator = ScanOrchestrator::from_config(&engine_config)?;

    info!(target = %target, "starting scan");
    let job_id = orchestrator.submit(target).await;

    // Ctrl-C cancels the in-flight job; the child tool processes are
    // killed and the job settles in the Cancelled state.
    let job = tokio::select! {
        job = orchestrator.wait(&job_id) => job?,
        _ = tokio::signal::ctrl_c() => {
            info!(job_id = job_id.as_str(), "interrupt received, cancelling scan");
            orchestrator.cancel(&job_id).await?;
            wait_for_terminal(&orchestrator, &job_id).await?
        }
    };
    info!(job_id = job.job_id.as_str(), status = %job.status, "scan finished");

    match orchestrator.report(&job_id).await? {
        ReportStatus::Ready(report) => {
            let payload = build_scan_report(&report, min_severity);
            writer.render(&payload)?;

            if payload.vulnerabilities.total > 0 {
                return Err(CliError::FindingsPresent(format!(
                    "found {} vulnerabilities",
                    payload.vulnerabilities.total
                )));
            }
            Ok(())
        }
        ReportStatus::Failed(failure) => Err(match failure.kind {
            FailureKind::ToolNotFound => CliError::ToolMissing(failure.message),
            _ => CliError::Command(failure.message),
        }),
        ReportStatus::Cancelled => Err(CliError::Command("scan cancelled".to_owned())),
        ReportStatus::NotReady(status) => Err(CliError::Command(format!(
            "job ended in unexpected state: {status}"
        ))),
    }
}

async fn wait_for_terminal<S, V>(
    orchestrator: &ScanOrchestrator<S, V>,
    job_id: &str,
) -> Result<vulnhawk_scan_engine::job::ScanJob, CliError>
where
    S: vulnhawk_scan_engine::adapter::SbomGenerator + Send + Sync + 'static,
    V: vulnhawk_scan_engine::adapter::VulnMatcher + Send + Sync + 'static,
{
    loop {
        let job = orchestrator.status(job_id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn parse_severity(s: &str) -> Result<Severity, CliError> {
    Severity::from_str_loose(s).ok_or_else(|| {
        CliError::Command(format!(
            "invalid severity: {s} (expected: unknown, low, medium, high, critical)"
        ))
    })
}

fn build_scan_report(report: &AggregatedReport, min_severity: Severity) -> ScanReport {
    let findings = report
        .findings
        .iter()
        .filter(|f| f.severity >= min_severity)
        .map(|f| FindingEntry {
            vuln_id: f.vuln_id.clone(),
            package: f.package.name.clone(),
            version: f.package.version.clone(),
            ecosystem: f.package.ecosystem.clone(),
            severity: f.severity.to_string(),
            fixed_version: f.fixed_version.clone(),
            sources: f.sources.iter().cloned().collect(),
            description: f.description.clone(),
        })
        .collect();

    ScanReport {
        job_id: report.job_id.clone(),
        target: report.target.to_string(),
        package_count: report.package_count(),
        vulnerabilities: VulnSummary {
            critical: report.severity_counts.critical,
            high: report.severity_counts.high,
            medium: report.severity_counts.medium,
            low: report.severity_counts.low,
            unknown: report.severity_counts.unknown,
            total: report.severity_counts.total(),
        },
        findings,
        anomalies: report.anomalies.iter().map(|a| a.to_string()).collect(),
    }
}

#[derive(Serialize)]
pub struct ScanReport {
    pub job_id: String,
    pub target: String,
    pub package_count: usize,
    pub vulnerabilities: VulnSummary,
    pub findings: Vec<FindingEntry>,
    pub anomalies: Vec<String>,
}

#[derive(Serialize, Default)]
pub struct VulnSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
    pub total: usize,
}

#[derive(Serialize)]
pub struct FindingEntry {
    pub vuln_id: String,
    pub package: String,
    pub version: String,
    pub ecosystem: String,
    pub severity: String,
    pub fixed_version: Option<String>,
    pub sources: Vec<String>,
    pub description: String,
}

impl Render for ScanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Scan: {}", self.target.bold())?;
        writeln!(w, "Packages: {}", self.package_count)?;
        writeln!(w)?;

        let summary = format!(
            "{} total (C:{} H:{} M:{} L:{} U:{})",
            self.vulnerabilities.total,
            self.vulnerabilities.critical,
            self.vulnerabilities.high,
            self.vulnerabilities.medium,
            self.vulnerabilities.low,
            self.vulnerabilities.unknown
        );
        if self.vulnerabilities.total > 0 {
            writeln!(w, "Vulnerabilities: {}", summary.red().bold())?;
        } else {
            writeln!(w, "Vulnerabilities: {}", summary.green().bold())?;
        }
        writeln!(w)?;

        if self.findings.is_empty() {
            writeln!(w, "{}", "No vulnerabilities to report.".green())?;
        } else {
            writeln!(
                w,
                "{:<20} {:<10} {:<25} {:<14} Fixed",
                "ID", "Severity", "Package", "Version"
            )?;
            writeln!(w, "{}", "-".repeat(84))?;

            for f in &self.findings {
                let severity_colored = match f.severity.as_str() {
                    "Critical" => f.severity.red().bold(),
                    "High" => f.severity.red(),
                    "Medium" => f.severity.yellow(),
                    "Low" => f.severity.normal(),
                    _ => f.severity.dimmed(),
                };

                writeln!(
                    w,
                    "{:<20} {:<10} {:<25} {:<14} {}",
                    f.vuln_id,
                    severity_colored,
                    f.package,
                    f.version,
                    f.fixed_version.as_deref().unwrap_or("N/A")
                )?;
            }
        }

        if !self.anomalies.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", "Anomalies:".yellow())?;
            for anomaly in &self.anomalies {
                writeln!(w, "  - {anomaly}")?;
            }
        }

        Ok(())
    }
}
