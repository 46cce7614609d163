//! 취약점 매칭 어댑터
//!
//! [`VulnToolAdapter`]는 SBOM을 CycloneDX JSON 임시 파일로 직렬화해
//! osv-scanner 계열 도구에 전달하고, OSV JSON 출력을 소스 원형
//! [`RawFinding`] 목록으로 파싱합니다.
//!
//! # 페이로드 정책
//!
//! SBOM과 달리 취약점 페이로드는 상위 단계의 기준 스냅샷이 아니므로
//! 파싱 실패는 치명적이지 않습니다. 형식이 깨진 출력은 경고 후
//! 빈 결과로 취급합니다. 반면 도구의 0이 아닌 종료 코드는 실행
//! 실패로 간주하여 그대로 전파합니다.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use vulnhawk_core::types::Sbom;

use crate::adapter::runner::ToolRunner;
use crate::error::AdapterError;

/// 취약점 도구가 보고한 소스 원형 Finding
///
/// 심각도는 소스 어휘 그대로의 문자열이며, 표준 [`Severity`]
/// (vulnhawk_core::types::Severity)로의 매핑은 정규화 단계가
/// 담당합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFinding {
    /// 취약점 ID (CVE, GHSA 등)
    pub vuln_id: String,
    /// 영향받는 패키지명
    pub package_name: String,
    /// 영향받는 패키지 버전
    pub package_version: String,
    /// 패키지 생태계 (소스 표기 그대로)
    pub ecosystem: String,
    /// 소스 어휘 그대로의 심각도 문자열
    pub severity: Option<String>,
    /// 수정된 버전 (있을 경우)
    pub fixed_version: Option<String>,
    /// 취약점 설명
    pub description: String,
    /// 도구 페이로드가 밝힌 결과 출처 (없으면 정규화 단계가
    /// 도구 이름으로 대체)
    pub source: Option<String>,
}

/// 취약점 매칭 계약
///
/// 오케스트레이터가 의존하는 유일한 매칭 인터페이스입니다.
/// 테스트에서는 목 구현을 주입합니다.
pub trait VulnMatcher: Send + Sync {
    /// 소스 표기에 사용될 도구 이름
    fn tool_name(&self) -> &str;

    /// SBOM의 패키지들을 취약점 데이터베이스와 대조합니다.
    fn match_vulnerabilities(
        &self,
        sbom: &Sbom,
    ) -> impl Future<Output = Result<Vec<RawFinding>, AdapterError>> + Send;
}

/// osv-scanner 계열 도구 기반 취약점 매칭 어댑터
#[derive(Debug, Clone)]
pub struct VulnToolAdapter {
    runner: ToolRunner,
}

impl VulnToolAdapter {
    /// 도구 바이너리와 타임아웃으로 어댑터를 생성합니다.
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            runner: ToolRunner::new("osv-scanner", binary, timeout),
        }
    }

    /// 도구 바이너리 실행 가능 여부를 사전 확인합니다.
    pub fn preflight(&self) -> Result<PathBuf, AdapterError> {
        self.runner.preflight()
    }

    fn write_sbom_file(&self, sbom: &Sbom) -> Result<tempfile::NamedTempFile, AdapterError> {
        let mut file =
            tempfile::Builder::new()
                .prefix("vulnhawk-sbom-")
                .suffix(".cdx.json")
                .tempfile()
                .map_err(|e| AdapterError::ToolCrashed {
                    tool: self.tool_name().to_owned(),
                    exit_code: None,
                    stderr: format!("failed to create sbom temp file: {e}"),
                })?;

        let payload = sbom_to_cyclonedx(sbom);
        file.write_all(payload.to_string().as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| AdapterError::ToolCrashed {
                tool: self.tool_name().to_owned(),
                exit_code: None,
                stderr: format!("failed to write sbom temp file: {e}"),
            })?;

        Ok(file)
    }
}

impl VulnMatcher for VulnToolAdapter {
    fn tool_name(&self) -> &str {
        self.runner.tool()
    }

    async fn match_vulnerabilities(&self, sbom: &Sbom) -> Result<Vec<RawFinding>, AdapterError> {
        // 빈 SBOM도 도구에 그대로 전달 (패키지 0개 = 정상 입력)
        // 임시 파일은 도구 실행이 끝날 때까지 살아 있어야 함
        let sbom_file = self.write_sbom_file(sbom)?;
        let args = vec![
            format!("--sbom={}", sbom_file.path().display()),
            "--format=json".to_owned(),
        ];

        let output = self.runner.run(&args).await?;

        let findings = match parse_osv(&output.stdout) {
            Ok(findings) => findings,
            Err(reason) => {
                warn!(
                    tool = self.tool_name(),
                    reason = reason.as_str(),
                    "vuln payload malformed, treating as zero findings"
                );
                Vec::new()
            }
        };

        info!(
            tool = self.tool_name(),
            finding_count = findings.len(),
            "vuln scan complete"
        );
        Ok(findings)
    }
}

/// SBOM을 CycloneDX JSON 문서로 직렬화합니다.
///
/// 각 패키지는 purl(`pkg:{ecosystem}/{name}@{version}`)을 포함해
/// 취약점 도구가 생태계를 식별할 수 있게 합니다.
fn sbom_to_cyclonedx(sbom: &Sbom) -> serde_json::Value {
    let components: Vec<serde_json::Value> = sbom
        .packages
        .iter()
        .map(|package| {
            json!({
                "type": "library",
                "name": package.name,
                "version": package.version,
                "purl": format!(
                    "pkg:{}/{}@{}",
                    package.ecosystem, package.name, package.version
                ),
            })
        })
        .collect();

    json!({
        "bomFormat": "CycloneDX",
        "specVersion": "1.5",
        "components": components,
    })
}

#[derive(Debug, Deserialize)]
struct OsvPayload {
    #[serde(default)]
    results: Vec<OsvResult>,
}

#[derive(Debug, Deserialize)]
struct OsvResult {
    #[serde(default)]
    source: Option<OsvSource>,
    #[serde(default)]
    packages: Vec<OsvPackage>,
}

#[derive(Debug, Deserialize)]
struct OsvSource {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsvPackage {
    package: OsvPackageInfo,
    #[serde(default)]
    vulnerabilities: Vec<OsvVuln>,
}

#[derive(Debug, Deserialize)]
struct OsvPackageInfo {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    ecosystem: String,
}

#[derive(Debug, Deserialize)]
struct OsvVuln {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    database_specific: Option<serde_json::Value>,
    #[serde(default)]
    affected: Vec<OsvAffected>,
}

#[derive(Debug, Deserialize)]
struct OsvAffected {
    #[serde(default)]
    ranges: Vec<OsvRange>,
}

#[derive(Debug, Deserialize)]
struct OsvRange {
    #[serde(default)]
    events: Vec<OsvEvent>,
}

#[derive(Debug, Deserialize)]
struct OsvEvent {
    #[serde(default)]
    fixed: Option<String>,
}

/// OSV JSON 페이로드를 [`RawFinding`] 목록으로 파싱합니다.
///
/// 실패 시 사유 문자열을 반환하며, 비치명 처리 여부는 호출자가
/// 결정합니다.
fn parse_osv(stdout: &str) -> Result<Vec<RawFinding>, String> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let payload: OsvPayload =
        serde_json::from_str(stdout).map_err(|e| format!("invalid osv json: {e}"))?;

    let mut findings = Vec::new();
    for result in payload.results {
        let result_source = result.source.as_ref().and_then(|s| s.path.clone());
        for package in result.packages {
            for vuln in &package.vulnerabilities {
                findings.push(RawFinding {
                    source: result_source.clone(),
                    vuln_id: vuln.id.clone(),
                    package_name: package.package.name.clone(),
                    package_version: package.package.version.clone(),
                    ecosystem: package.package.ecosystem.clone(),
                    severity: extract_severity(vuln),
                    fixed_version: extract_fixed_version(vuln),
                    description: vuln
                        .summary
                        .clone()
                        .or_else(|| vuln.details.clone())
                        .unwrap_or_default(),
                });
            }
        }
    }
    Ok(findings)
}

fn extract_severity(vuln: &OsvVuln) -> Option<String> {
    vuln.database_specific
        .as_ref()
        .and_then(|ds| ds.get("severity"))
        .and_then(|s| s.as_str())
        .map(|s| s.to_owned())
}

fn extract_fixed_version(vuln: &OsvVuln) -> Option<String> {
    vuln.affected
        .iter()
        .flat_map(|affected| &affected.ranges)
        .flat_map(|range| &range.events)
        .find_map(|event| event.fixed.clone())
}
