//! 설정 로딩 통합 테스트
//!
//! 파일 로드, 환경변수 오버라이드, 유효성 검증의 상호작용을 검증합니다.

use vulnhawk_core::config::VulnhawkConfig;
use vulnhawk_core::error::{ConfigError, VulnhawkError};

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn load_from_file_roundtrip() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = dir.path().join("vulnhawk.toml");
    tokio::fs::write(
        &path,
        r#"
[general]
log_level = "debug"

[scan]
sbom_tool_path = "/opt/tools/syft"
max_concurrent_jobs = 2
"#,
    )
    .await
    .expect("should write config file");

    let config = VulnhawkConfig::from_file(&path).await.expect("should load");
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.scan.sbom_tool_path, "/opt/tools/syft");
    assert_eq!(config.scan.max_concurrent_jobs, 2);
    // 생략된 필드는 기본값
    assert_eq!(config.scan.vuln_tool_path, "osv-scanner");
}

#[tokio::test]
async fn load_missing_file_reports_file_not_found() {
    let result = VulnhawkConfig::from_file("/nonexistent/vulnhawk.toml").await;
    assert!(matches!(
        result,
        Err(VulnhawkError::Config(ConfigError::FileNotFound { .. }))
    ));
}

#[tokio::test]
async fn load_invalid_file_fails_validation() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = dir.path().join("vulnhawk.toml");
    tokio::fs::write(
        &path,
        r#"
[scan]
max_concurrent_jobs = 0
"#,
    )
    .await
    .expect("should write config file");

    let result = VulnhawkConfig::from_file(&path).await;
    assert!(matches!(
        result,
        Err(VulnhawkError::Config(ConfigError::InvalidValue { .. }))
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[scan]
max_retries = 1
"#;

    let original = std::env::var("VULNHAWK_SCAN_MAX_RETRIES").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("VULNHAWK_SCAN_MAX_RETRIES", "5");
    }

    let mut config = VulnhawkConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.scan.max_retries;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("VULNHAWK_SCAN_MAX_RETRIES", val),
            None => std::env::remove_var("VULNHAWK_SCAN_MAX_RETRIES"),
        }
    }

    assert_eq!(result, 5);
}

#[test]
#[serial_test::serial]
fn env_override_severity_map_merges_pairs() {
    let original = std::env::var("VULNHAWK_SCAN_SEVERITY_OVERRIDES").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var(
            "VULNHAWK_SCAN_SEVERITY_OVERRIDES",
            "moderate=medium, important=high",
        );
    }

    let mut config = VulnhawkConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let moderate = config.scan.severity_overrides.get("moderate").cloned();
    let important = config.scan.severity_overrides.get("important").cloned();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("VULNHAWK_SCAN_SEVERITY_OVERRIDES", val),
            None => std::env::remove_var("VULNHAWK_SCAN_SEVERITY_OVERRIDES"),
        }
    }

    assert_eq!(moderate.as_deref(), Some("medium"));
    assert_eq!(important.as_deref(), Some("high"));
}

#[test]
#[serial_test::serial]
fn env_override_ignores_unparseable_numbers() {
    let original = std::env::var("VULNHAWK_SCAN_MAX_CONCURRENT_JOBS").ok();
    // SAFETY: 테스트는 serial로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("VULNHAWK_SCAN_MAX_CONCURRENT_JOBS", "many");
    }

    let mut config = VulnhawkConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.scan.max_concurrent_jobs;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("VULNHAWK_SCAN_MAX_CONCURRENT_JOBS", val),
            None => std::env::remove_var("VULNHAWK_SCAN_MAX_CONCURRENT_JOBS"),
        }
    }

    // 파싱 불가 값은 무시하고 기본값 유지
    assert_eq!(result, 4);
}
