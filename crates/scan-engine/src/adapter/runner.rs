//! 서브프로세스 실행 공통 계약
//!
//! [`ToolRunner`]는 외부 분석 도구 한 번의 호출을 담당합니다:
//! 격리된 자식 프로세스 하나를 생성하고, stdout 전체를 페이로드로,
//! stderr를 진단용으로 캡처하며, wall-clock 타임아웃을 강제합니다.
//!
//! # 종료 보장
//!
//! 자식 프로세스 핸들은 `kill_on_drop`으로 생성되므로 타임아웃이나
//! 취소로 대기 future가 드롭되는 모든 경로에서 프로세스가 종료됩니다.
//! 호출자를 무한정 블로킹하는 경로는 없습니다.
//!
//! # 상태 없음
//!
//! 호출 간 공유 가변 상태가 없어 동시 호출이 안전합니다.
//! 호출당 정확히 하나의 서브프로세스를 생성합니다.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AdapterError;

/// stderr 진단 출력 보존 상한 (바이트)
const MAX_STDERR_BYTES: usize = 4096;

/// 도구 실행 원시 결과
///
/// stdout이 페이로드이고 stderr는 진단 전용입니다.
/// 파싱은 각 어댑터 특화 계층의 책임입니다.
#[derive(Debug, Clone)]
pub struct RawOutput {
    /// 표준 출력 전체 (페이로드)
    pub stdout: String,
    /// 표준 에러 (진단용, 절단됨)
    pub stderr: String,
}

/// 단일 외부 도구 실행기
///
/// 도구 레이블, 바이너리 경로, 타임아웃을 고정하여 생성하고
/// `run(args)`으로 호출합니다.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    /// 로깅/에러용 도구 레이블
    tool: String,
    /// 도구 바이너리 경로
    binary: PathBuf,
    /// wall-clock 타임아웃
    timeout: Duration,
}

impl ToolRunner {
    /// 새 실행기를 생성합니다.
    pub fn new(tool: impl Into<String>, binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            tool: tool.into(),
            binary: binary.into(),
            timeout,
        }
    }

    /// 도구 레이블을 반환합니다.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// 도구 바이너리가 실행 가능한지 사전 확인합니다.
    ///
    /// 스캔 시작 전에 호출하면 잡을 소비하지 않고 환경 문제를
    /// 조기에 보고할 수 있습니다. 해석된 절대 경로를 반환합니다.
    pub fn preflight(&self) -> Result<PathBuf, AdapterError> {
        resolve_binary(&self.binary).ok_or_else(|| AdapterError::ToolNotFound {
            tool: self.binary.display().to_string(),
        })
    }

    /// 도구를 한 번 실행하고 출력을 캡처합니다.
    ///
    /// # Errors
    ///
    /// - `ToolNotFound`: 바이너리 부재 또는 실행 불가
    /// - `ToolTimeout`: 타임아웃 초과 (자식 프로세스는 종료됨)
    /// - `ToolCrashed`: 0이 아닌 종료 코드 또는 대기 실패
    pub async fn run(&self, args: &[String]) -> Result<RawOutput, AdapterError> {
        debug!(
            tool = self.tool.as_str(),
            binary = %self.binary.display(),
            ?args,
            timeout_secs = self.timeout.as_secs(),
            "invoking external tool"
        );

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| self.classify_spawn_error(&e))?;

        // wait_with_output future가 타임아웃으로 드롭되면
        // kill_on_drop이 자식을 종료합니다.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_elapsed) => {
                warn!(
                    tool = self.tool.as_str(),
                    timeout_secs = self.timeout.as_secs(),
                    "tool exceeded timeout, child killed"
                );
                return Err(AdapterError::ToolTimeout {
                    tool: self.tool.clone(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            Ok(Err(e)) => {
                return Err(AdapterError::ToolCrashed {
                    tool: self.tool.clone(),
                    exit_code: None,
                    stderr: e.to_string(),
                });
            }
            Ok(Ok(output)) => output,
        };

        let stderr = truncate_diagnostic(&output.stderr);

        if !output.status.success() {
            return Err(AdapterError::ToolCrashed {
                tool: self.tool.clone(),
                exit_code: output.status.code(),
                stderr,
            });
        }

        debug!(
            tool = self.tool.as_str(),
            stdout_bytes = output.stdout.len(),
            "tool completed"
        );

        Ok(RawOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        })
    }

    fn classify_spawn_error(&self, e: &std::io::Error) -> AdapterError {
        match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                AdapterError::ToolNotFound {
                    tool: self.binary.display().to_string(),
                }
            }
            _ => AdapterError::ToolCrashed {
                tool: self.tool.clone(),
                exit_code: None,
                stderr: e.to_string(),
            },
        }
    }
}

/// 도구 바이너리를 해석합니다.
///
/// 경로 구분자가 포함되어 있으면 해당 경로를 직접 확인하고,
/// 이름만 주어지면 `PATH`를 탐색합니다.
pub fn resolve_binary(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 {
        return is_executable(binary).then(|| binary.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

fn truncate_diagnostic(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.len() <= MAX_STDERR_BYTES {
        return text.into_owned();
    }
    let mut end = MAX_STDERR_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}
