//! SBOM 생성 어댑터
//!
//! [`SbomToolAdapter`]는 syft 계열 도구를 호출하여 스캔 대상의
//! CycloneDX JSON SBOM을 생성하고 표준 [`Sbom`] 타입으로 파싱합니다.
//!
//! SBOM은 이후 모든 단계의 기준 스냅샷이므로 페이로드 파싱 실패는
//! 치명적입니다 (`ToolOutputMalformed`). 빈 패키지 목록은 유효한
//! 결과입니다.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use vulnhawk_core::types::{Package, Sbom, Target};

use crate::adapter::runner::ToolRunner;
use crate::error::AdapterError;

/// syft가 패키지 발견 위치를 담는 컴포넌트 속성 키
const LOCATION_PROPERTY: &str = "syft:location:0:path";

/// SBOM 생성 계약
///
/// 오케스트레이터가 의존하는 유일한 SBOM 생성 인터페이스입니다.
/// 테스트에서는 목 구현을 주입합니다.
pub trait SbomGenerator: Send + Sync {
    /// 소스 표기에 사용될 도구 이름
    fn tool_name(&self) -> &str;

    /// 대상의 SBOM을 생성합니다.
    fn generate(&self, target: &Target) -> impl Future<Output = Result<Sbom, AdapterError>> + Send;
}

/// syft 계열 도구 기반 SBOM 생성 어댑터
#[derive(Debug, Clone)]
pub struct SbomToolAdapter {
    runner: ToolRunner,
}

impl SbomToolAdapter {
    /// 도구 바이너리와 타임아웃으로 어댑터를 생성합니다.
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            runner: ToolRunner::new("syft", binary, timeout),
        }
    }

    /// 도구 바이너리 실행 가능 여부를 사전 확인합니다.
    pub fn preflight(&self) -> Result<PathBuf, AdapterError> {
        self.runner.preflight()
    }
}

impl SbomGenerator for SbomToolAdapter {
    fn tool_name(&self) -> &str {
        self.runner.tool()
    }

    async fn generate(&self, target: &Target) -> Result<Sbom, AdapterError> {
        let args = vec![
            "packages".to_owned(),
            target.to_string(),
            "-o".to_owned(),
            "cyclonedx-json".to_owned(),
        ];

        let output = self.runner.run(&args).await?;
        let sbom = parse_cyclonedx(self.tool_name(), &output.stdout)?;

        info!(
            target = %target,
            package_count = sbom.package_count(),
            "sbom generated"
        );
        Ok(sbom)
    }
}

#[derive(Debug, Deserialize)]
struct CycloneDxPayload {
    #[serde(default)]
    components: Vec<CycloneDxComponent>,
}

#[derive(Debug, Deserialize)]
struct CycloneDxComponent {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    purl: Option<String>,
    #[serde(default)]
    properties: Vec<CycloneDxProperty>,
}

#[derive(Debug, Deserialize)]
struct CycloneDxProperty {
    name: String,
    value: String,
}

/// CycloneDX JSON 페이로드를 표준 [`Sbom`]으로 파싱합니다.
///
/// `components` 필드 부재는 빈 SBOM으로 취급하고,
/// JSON 자체가 깨진 경우만 에러입니다.
fn parse_cyclonedx(tool: &str, stdout: &str) -> Result<Sbom, AdapterError> {
    let payload: CycloneDxPayload =
        serde_json::from_str(stdout).map_err(|e| AdapterError::ToolOutputMalformed {
            tool: tool.to_owned(),
            reason: format!("invalid cyclonedx json: {e}"),
        })?;

    let packages = payload
        .components
        .into_iter()
        .map(|component| {
            let ecosystem = ecosystem_from_purl(component.purl.as_deref());
            let source_location = component
                .properties
                .iter()
                .find(|p| p.name == LOCATION_PROPERTY)
                .map(|p| p.value.clone());
            Package {
                name: component.name,
                version: component.version,
                ecosystem,
                source_location,
            }
        })
        .collect();

    debug!(tool, "cyclonedx payload parsed");
    Ok(Sbom::new(packages))
}

/// purl(`pkg:npm/left-pad@1.0.0`)에서 생태계 타입을 추출합니다.
///
/// purl이 없거나 형식이 어긋나면 `unknown`입니다.
fn ecosystem_from_purl(purl: Option<&str>) -> String {
    purl.and_then(|p| p.strip_prefix("pkg:"))
        .and_then(|rest| rest.split('/').next())
        .filter(|eco| !eco.is_empty())
        .map(|eco| eco.to_lowercase())
        .unwrap_or_else(|| "unknown".to_owned())
}
