//! 스캔 엔진 에러 타입
//!
//! [`AdapterError`]는 외부 도구 호출 한 번의 실패 양상을,
//! [`ScanEngineError`]는 엔진 전반의 에러를 나타냅니다.
//! `From<ScanEngineError> for VulnhawkError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! # 재시도 분류
//!
//! 재시도 여부는 명시적 정책 테이블입니다: `ToolTimeout`만 일시적
//! 장애로 간주하여 재시도하며, 나머지는 환경/설정 문제라 즉시
//! 실패합니다 ([`AdapterError::is_retryable`]).

use vulnhawk_core::error::{ScanError, VulnhawkError};

/// 외부 도구 호출 실패
///
/// 어댑터 계약(`run`)의 에러 절반입니다. 각 변형은 서로 다른
/// 운영자 조치를 요구하므로 메시지 문자열이 아니라 타입으로
/// 구분합니다.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// 도구 바이너리를 찾을 수 없거나 실행할 수 없음
    #[error("tool not found: {tool}")]
    ToolNotFound {
        /// 도구 바이너리 경로 또는 이름
        tool: String,
    },

    /// 도구가 wall-clock 타임아웃을 초과함 (재시도 대상)
    #[error("tool timed out: {tool} after {timeout_secs}s")]
    ToolTimeout {
        /// 도구 바이너리 경로 또는 이름
        tool: String,
        /// 적용된 타임아웃 (초)
        timeout_secs: u64,
    },

    /// 도구가 0이 아닌 종료 코드로 종료함
    #[error("tool crashed: {tool} (exit: {exit_code:?}): {stderr}")]
    ToolCrashed {
        /// 도구 바이너리 경로 또는 이름
        tool: String,
        /// 종료 코드 (시그널 종료 시 None)
        exit_code: Option<i32>,
        /// stderr 진단 출력 (절단됨)
        stderr: String,
    },

    /// 종료 코드는 0이지만 출력이 기대 스키마로 파싱되지 않음
    #[error("tool output malformed: {tool}: {reason}")]
    ToolOutputMalformed {
        /// 도구 바이너리 경로 또는 이름
        tool: String,
        /// 파싱 실패 사유
        reason: String,
    },
}

impl AdapterError {
    /// 같은 입력으로 재시도할 가치가 있는 에러인지 반환합니다.
    ///
    /// `ToolTimeout`만 해당합니다. `ToolNotFound`/`ToolCrashed`/
    /// `ToolOutputMalformed`는 재시도해도 결과가 달라지지 않습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ToolTimeout { .. })
    }

    /// 관련 도구 이름을 반환합니다.
    pub fn tool(&self) -> &str {
        match self {
            Self::ToolNotFound { tool }
            | Self::ToolTimeout { tool, .. }
            | Self::ToolCrashed { tool, .. }
            | Self::ToolOutputMalformed { tool, .. } => tool,
        }
    }
}

/// 스캔 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanEngineError {
    /// 외부 도구 호출 실패
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 존재하지 않는 잡 참조
    #[error("job not found: {job_id}")]
    JobNotFound {
        /// 잡 ID
        job_id: String,
    },

    /// 허용되지 않는 잡 상태 전이
    #[error("invalid job transition: {from} -> {to}")]
    InvalidTransition {
        /// 현재 상태
        from: String,
        /// 요청된 상태
        to: String,
    },
}

impl From<ScanEngineError> for VulnhawkError {
    fn from(err: ScanEngineError) -> Self {
        match err {
            ScanEngineError::Adapter(e) => VulnhawkError::Scan(ScanError::Tool(e.to_string())),
            ScanEngineError::Config { field, reason } => VulnhawkError::Scan(ScanError::Job(
                format!("config error: {field}: {reason}"),
            )),
            ScanEngineError::JobNotFound { job_id } => {
                VulnhawkError::Scan(ScanError::Job(format!("job not found: {job_id}")))
            }
            ScanEngineError::InvalidTransition { from, to } => VulnhawkError::Scan(ScanError::Job(
                format!("invalid job transition: {from} -> {to}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_is_retryable() {
        let timeout = AdapterError::ToolTimeout {
            tool: "syft".to_owned(),
            timeout_secs: 300,
        };
        assert!(timeout.is_retryable());

        let not_found = AdapterError::ToolNotFound {
            tool: "syft".to_owned(),
        };
        assert!(!not_found.is_retryable());

        let crashed = AdapterError::ToolCrashed {
            tool: "osv-scanner".to_owned(),
            exit_code: Some(2),
            stderr: "db unreachable".to_owned(),
        };
        assert!(!crashed.is_retryable());

        let malformed = AdapterError::ToolOutputMalformed {
            tool: "syft".to_owned(),
            reason: "not json".to_owned(),
        };
        assert!(!malformed.is_retryable());
    }

    #[test]
    fn adapter_error_reports_tool_name() {
        let err = AdapterError::ToolCrashed {
            tool: "osv-scanner".to_owned(),
            exit_code: Some(127),
            stderr: String::new(),
        };
        assert_eq!(err.tool(), "osv-scanner");
    }

    #[test]
    fn tool_crashed_display_includes_exit_code_and_stderr() {
        let err = AdapterError::ToolCrashed {
            tool: "osv-scanner".to_owned(),
            exit_code: Some(2),
            stderr: "network unreachable".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("osv-scanner"));
        assert!(msg.contains('2'));
        assert!(msg.contains("network unreachable"));
    }

    #[test]
    fn converts_adapter_error_to_core_tool_error() {
        let err = ScanEngineError::Adapter(AdapterError::ToolNotFound {
            tool: "syft".to_owned(),
        });
        let core_err: VulnhawkError = err.into();
        assert!(matches!(core_err, VulnhawkError::Scan(ScanError::Tool(_))));
    }

    #[test]
    fn converts_job_not_found_to_core_job_error() {
        let err = ScanEngineError::JobNotFound {
            job_id: "missing".to_owned(),
        };
        let core_err: VulnhawkError = err.into();
        assert!(matches!(core_err, VulnhawkError::Scan(ScanError::Job(_))));
    }
}
