//! CLI-specific error types and exit code mapping

use vulnhawk_core::error::VulnhawkError;
use vulnhawk_scan_engine::error::ScanEngineError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes so that
/// scripts can distinguish "scan found vulnerabilities" from real
/// failures.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// A required external tool is not installed or not executable.
    #[error("tool not available: {0}")]
    ToolMissing(String),

    /// The scan completed and reported vulnerabilities.
    #[error("{0}")]
    FindingsPresent(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from vulnhawk-core.
    #[error("{0}")]
    Core(#[from] VulnhawkError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                               |
    /// |------|---------------------------------------|
    /// | 0    | Success                               |
    /// | 1    | General / command error               |
    /// | 2    | Configuration error                   |
    /// | 3    | Required tool missing                 |
    /// | 4    | Scan found vulnerabilities            |
    /// | 10   | IO error                              |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::ToolMissing(_) => 3,
            Self::FindingsPresent(_) => 4,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<ScanEngineError> for CliError {
    fn from(e: ScanEngineError) -> Self {
        match &e {
            ScanEngineError::Config { .. } => Self::Config(e.to_string()),
            _ => Self::Command(e.to_string()),
        }
    }
}
