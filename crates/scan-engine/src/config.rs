//! 스캔 엔진 설정
//!
//! [`ScanEngineConfig`]는 core의 [`ScanConfig`](vulnhawk_core::config::ScanConfig)를
//! 타입이 있는 형태(`PathBuf`, `Duration`, `Severity`)로 변환한 설정입니다.
//!
//! # 사용 예시
//!
//! ```
//! use vulnhawk_scan_engine::config::{ScanEngineConfig, ScanEngineConfigBuilder};
//!
//! // 기본값으로 생성
//! let config = ScanEngineConfig::default();
//! config.validate().unwrap();
//!
//! // 빌더로 생성
//! let config = ScanEngineConfigBuilder::new()
//!     .max_retries(2)
//!     .max_concurrent_jobs(8)
//!     .build()
//!     .unwrap();
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use vulnhawk_core::types::Severity;

use crate::error::ScanEngineError;

/// 설정 상한값 상수
const MAX_TIMEOUT: Duration = Duration::from_secs(3600);
const MAX_RETRY_LIMIT: u32 = 10;
const MAX_JOB_LIMIT: usize = 64;

/// 스캔 엔진 설정
///
/// # 필드
///
/// - **sbom_tool_path / vuln_tool_path**: 외부 도구 바이너리
/// - **sbom_timeout / vuln_timeout**: 단계별 wall-clock 타임아웃
/// - **max_retries**: `ToolTimeout` 시 추가 호출 허용 횟수
/// - **max_concurrent_jobs**: 동시 잡 상한 (서브프로세스 압력 제한)
/// - **severity_overrides**: 소스 심각도 어휘 오버라이드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEngineConfig {
    /// SBOM 생성 도구 바이너리 경로
    pub sbom_tool_path: PathBuf,
    /// 취약점 매칭 도구 바이너리 경로
    pub vuln_tool_path: PathBuf,
    /// SBOM 생성 단계 타임아웃
    pub sbom_timeout: Duration,
    /// 취약점 스캔 단계 타임아웃
    pub vuln_timeout: Duration,
    /// 타임아웃 시 어댑터 호출 최대 재시도 횟수
    pub max_retries: u32,
    /// 동시 실행 잡 수 상한
    pub max_concurrent_jobs: usize,
    /// 소스 심각도 어휘 오버라이드 (소문자 키)
    pub severity_overrides: HashMap<String, Severity>,
}

impl Default for ScanEngineConfig {
    fn default() -> Self {
        Self {
            sbom_tool_path: PathBuf::from("syft"),
            vuln_tool_path: PathBuf::from("osv-scanner"),
            sbom_timeout: Duration::from_secs(300),
            vuln_timeout: Duration::from_secs(300),
            max_retries: 1,
            max_concurrent_jobs: 4,
            severity_overrides: HashMap::new(),
        }
    }
}

impl ScanEngineConfig {
    /// core의 `ScanConfig`에서 엔진 설정을 생성합니다.
    ///
    /// 표준 심각도로 파싱되지 않는 오버라이드 값은 경고 후 무시합니다
    /// (core 설정 검증을 거쳤다면 발생하지 않습니다).
    pub fn from_core(core: &vulnhawk_core::config::ScanConfig) -> Self {
        let mut severity_overrides = HashMap::new();
        for (key, value) in &core.severity_overrides {
            match Severity::from_str_loose(value) {
                Some(severity) => {
                    severity_overrides.insert(key.to_lowercase(), severity);
                }
                None => warn!(
                    key = key.as_str(),
                    value = value.as_str(),
                    "severity override value is not canonical, ignoring"
                ),
            }
        }

        Self {
            sbom_tool_path: PathBuf::from(&core.sbom_tool_path),
            vuln_tool_path: PathBuf::from(&core.vuln_tool_path),
            sbom_timeout: Duration::from_secs(core.sbom_timeout_secs),
            vuln_timeout: Duration::from_secs(core.vuln_timeout_secs),
            max_retries: core.max_retries,
            max_concurrent_jobs: core.max_concurrent_jobs,
            severity_overrides,
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - 도구 경로: 비어 있으면 안 됨
    /// - 타임아웃: 1초-3600초
    /// - `max_retries`: 0-10
    /// - `max_concurrent_jobs`: 1-64
    pub fn validate(&self) -> Result<(), ScanEngineError> {
        if self.sbom_tool_path.as_os_str().is_empty() {
            return Err(ScanEngineError::Config {
                field: "sbom_tool_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.vuln_tool_path.as_os_str().is_empty() {
            return Err(ScanEngineError::Config {
                field: "vuln_tool_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        for (field, value) in [
            ("sbom_timeout", self.sbom_timeout),
            ("vuln_timeout", self.vuln_timeout),
        ] {
            if value.is_zero() || value > MAX_TIMEOUT {
                return Err(ScanEngineError::Config {
                    field: field.to_owned(),
                    reason: format!("must be 1-{}s", MAX_TIMEOUT.as_secs()),
                });
            }
        }

        if self.max_retries > MAX_RETRY_LIMIT {
            return Err(ScanEngineError::Config {
                field: "max_retries".to_owned(),
                reason: format!("must be 0-{MAX_RETRY_LIMIT}"),
            });
        }

        if self.max_concurrent_jobs == 0 || self.max_concurrent_jobs > MAX_JOB_LIMIT {
            return Err(ScanEngineError::Config {
                field: "max_concurrent_jobs".to_owned(),
                reason: format!("must be 1-{MAX_JOB_LIMIT}"),
            });
        }

        Ok(())
    }
}

/// [`ScanEngineConfig`] 빌더
#[derive(Default)]
pub struct ScanEngineConfigBuilder {
    config: ScanEngineConfig,
}

impl ScanEngineConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// SBOM 도구 경로를 설정합니다.
    pub fn sbom_tool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.sbom_tool_path = path.into();
        self
    }

    /// 취약점 도구 경로를 설정합니다.
    pub fn vuln_tool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.vuln_tool_path = path.into();
        self
    }

    /// SBOM 단계 타임아웃을 설정합니다.
    pub fn sbom_timeout(mut self, timeout: Duration) -> Self {
        self.config.sbom_timeout = timeout;
        self
    }

    /// 취약점 단계 타임아웃을 설정합니다.
    pub fn vuln_timeout(mut self, timeout: Duration) -> Self {
        self.config.vuln_timeout = timeout;
        self
    }

    /// 최대 재시도 횟수를 설정합니다.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// 동시 잡 상한을 설정합니다.
    pub fn max_concurrent_jobs(mut self, max: usize) -> Self {
        self.config.max_concurrent_jobs = max;
        self
    }

    /// 심각도 오버라이드 항목을 추가합니다 (키는 소문자 정규화).
    pub fn severity_override(mut self, key: impl Into<String>, severity: Severity) -> Self {
        self.config
            .severity_overrides
            .insert(key.into().to_lowercase(), severity);
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScanEngineError::Config` 반환
    pub fn build(self) -> Result<ScanEngineConfig, ScanEngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ScanEngineConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = vulnhawk_core::config::ScanConfig {
            sbom_tool_path: "/opt/tools/syft".to_owned(),
            vuln_tool_path: "/opt/tools/osv-scanner".to_owned(),
            sbom_timeout_secs: 120,
            vuln_timeout_secs: 600,
            max_retries: 3,
            max_concurrent_jobs: 8,
            severity_overrides: [("Moderate".to_owned(), "medium".to_owned())].into(),
        };
        let config = ScanEngineConfig::from_core(&core);
        assert_eq!(config.sbom_tool_path, PathBuf::from("/opt/tools/syft"));
        assert_eq!(config.vuln_timeout, Duration::from_secs(600));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_concurrent_jobs, 8);
        // 오버라이드 키는 소문자 정규화
        assert_eq!(
            config.severity_overrides.get("moderate"),
            Some(&Severity::Medium)
        );
    }

    #[test]
    fn from_core_skips_invalid_override_values() {
        let core = vulnhawk_core::config::ScanConfig {
            severity_overrides: [("p0".to_owned(), "catastrophic".to_owned())].into(),
            ..Default::default()
        };
        let config = ScanEngineConfig::from_core(&core);
        assert!(config.severity_overrides.is_empty());
    }

    #[test]
    fn validate_rejects_empty_tool_path() {
        let config = ScanEngineConfig {
            sbom_tool_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = ScanEngineConfig {
            vuln_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_excessive_timeout() {
        let config = ScanEngineConfig {
            sbom_timeout: Duration::from_secs(7200),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_excessive_retries() {
        let config = ScanEngineConfig {
            max_retries: 11,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrent_jobs() {
        let config = ScanEngineConfig {
            max_concurrent_jobs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = ScanEngineConfigBuilder::new()
            .sbom_tool_path("/usr/local/bin/syft")
            .vuln_tool_path("/usr/local/bin/osv-scanner")
            .sbom_timeout(Duration::from_secs(60))
            .vuln_timeout(Duration::from_secs(90))
            .max_retries(2)
            .max_concurrent_jobs(2)
            .severity_override("Important", Severity::High)
            .build()
            .unwrap();

        assert_eq!(config.sbom_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 2);
        assert_eq!(
            config.severity_overrides.get("important"),
            Some(&Severity::High)
        );
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = ScanEngineConfigBuilder::new().max_concurrent_jobs(0).build();
        assert!(result.is_err());
    }
}
