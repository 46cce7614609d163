//! 에러 타입 — 도메인별 에러 정의

/// Vulnhawk 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum VulnhawkError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스캔 파이프라인 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스캔 파이프라인 에러
///
/// scan-engine의 도메인 에러가 이 범주로 변환되어 상위로 전파됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 외부 분석 도구 실행/파싱 실패
    #[error("tool error: {0}")]
    Tool(String),

    /// 잡 상태 전이 또는 레지스트리 에러
    #[error("job error: {0}")]
    Job(String),
}
