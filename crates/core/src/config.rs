//! 설정 관리 — vulnhawk.toml 파싱 및 런타임 설정
//!
//! [`VulnhawkConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`VULNHAWK_SCAN_SBOM_TOOL_PATH=/usr/local/bin/syft` 형식)
//! 3. 설정 파일 (`vulnhawk.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), vulnhawk_core::error::VulnhawkError> {
//! use vulnhawk_core::config::VulnhawkConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = VulnhawkConfig::load("vulnhawk.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = VulnhawkConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, VulnhawkError};
use crate::types::Severity;

/// Vulnhawk 통합 설정
///
/// `vulnhawk.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulnhawkConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캔 엔진 설정
    #[serde(default)]
    pub scan: ScanConfig,
}

impl VulnhawkConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, VulnhawkError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, VulnhawkError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VulnhawkError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                VulnhawkError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, VulnhawkError> {
        toml::from_str(toml_str).map_err(|e| {
            VulnhawkError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `VULNHAWK_{SECTION}_{FIELD}`
    /// 예: `VULNHAWK_SCAN_MAX_RETRIES=3`
    ///
    /// `severity_overrides`는 `moderate=medium,important=high` 형태의
    /// 쉼표 구분 `key=value` 목록을 받습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "VULNHAWK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "VULNHAWK_GENERAL_LOG_FORMAT");

        // Scan
        override_string(&mut self.scan.sbom_tool_path, "VULNHAWK_SCAN_SBOM_TOOL_PATH");
        override_string(&mut self.scan.vuln_tool_path, "VULNHAWK_SCAN_VULN_TOOL_PATH");
        override_u64(
            &mut self.scan.sbom_timeout_secs,
            "VULNHAWK_SCAN_SBOM_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.scan.vuln_timeout_secs,
            "VULNHAWK_SCAN_VULN_TIMEOUT_SECS",
        );
        override_u32(&mut self.scan.max_retries, "VULNHAWK_SCAN_MAX_RETRIES");
        override_usize(
            &mut self.scan.max_concurrent_jobs,
            "VULNHAWK_SCAN_MAX_CONCURRENT_JOBS",
        );
        override_map(
            &mut self.scan.severity_overrides,
            "VULNHAWK_SCAN_SEVERITY_OVERRIDES",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), VulnhawkError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 도구 경로 검증
        if self.scan.sbom_tool_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scan.sbom_tool_path".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }
        if self.scan.vuln_tool_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scan.vuln_tool_path".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        // 타임아웃 검증
        const MAX_TIMEOUT_SECS: u64 = 3600;
        for (field, value) in [
            ("scan.sbom_timeout_secs", self.scan.sbom_timeout_secs),
            ("scan.vuln_timeout_secs", self.scan.vuln_timeout_secs),
        ] {
            if value == 0 || value > MAX_TIMEOUT_SECS {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: format!("must be 1-{MAX_TIMEOUT_SECS}"),
                }
                .into());
            }
        }

        // 재시도 횟수 검증
        const MAX_RETRY_LIMIT: u32 = 10;
        if self.scan.max_retries > MAX_RETRY_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "scan.max_retries".to_owned(),
                reason: format!("must be 0-{MAX_RETRY_LIMIT}"),
            }
            .into());
        }

        // 동시 잡 수 검증
        const MAX_JOB_LIMIT: usize = 64;
        if self.scan.max_concurrent_jobs == 0 || self.scan.max_concurrent_jobs > MAX_JOB_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "scan.max_concurrent_jobs".to_owned(),
                reason: format!("must be 1-{MAX_JOB_LIMIT}"),
            }
            .into());
        }

        // 심각도 오버라이드 값 검증 (키는 도구 어휘라 자유 형식)
        for (key, value) in &self.scan.severity_overrides {
            if Severity::from_str_loose(value).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: format!("scan.severity_overrides.{key}"),
                    reason: format!(
                        "'{value}' is not a canonical severity (unknown, low, medium, high, critical)"
                    ),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 스캔 엔진 설정
///
/// 외부 도구 경로, 단계별 타임아웃, 재시도/동시성 한도를 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// SBOM 생성 도구 바이너리 경로
    pub sbom_tool_path: String,
    /// 취약점 매칭 도구 바이너리 경로
    pub vuln_tool_path: String,
    /// SBOM 생성 단계 타임아웃 (초)
    pub sbom_timeout_secs: u64,
    /// 취약점 스캔 단계 타임아웃 (초)
    pub vuln_timeout_secs: u64,
    /// 타임아웃 시 어댑터 호출 최대 재시도 횟수
    pub max_retries: u32,
    /// 동시에 실행 가능한 잡 수 상한
    pub max_concurrent_jobs: usize,
    /// 소스 심각도 어휘 오버라이드 (도구 문자열 -> 표준 심각도)
    pub severity_overrides: HashMap<String, String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sbom_tool_path: "syft".to_owned(),
            vuln_tool_path: "osv-scanner".to_owned(),
            sbom_timeout_secs: 300,
            vuln_timeout_secs: 300,
            max_retries: 1,
            max_concurrent_jobs: 4,
            severity_overrides: HashMap::new(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_map(target: &mut HashMap<String, String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        for pair in val.split(',') {
            match pair.split_once('=') {
                Some((key, value)) => {
                    target.insert(key.trim().to_owned(), value.trim().to_owned());
                }
                None => warn!(
                    env_key,
                    pair, "malformed key=value pair in env var, ignoring"
                ),
            }
        }
    }
}
