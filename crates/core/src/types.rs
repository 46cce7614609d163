//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 스캔 파이프라인의 모든 단계가 공유하는 데이터 구조를 정의합니다.
//! 어댑터 고유 스키마는 각 어댑터 내부에 머물고, 정규화 이후에는
//! 이 타입들만 흐릅니다.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 스캔 대상
///
/// 잡이 시작되면 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// 파일시스템 디렉토리
    Directory(PathBuf),
    /// 컨테이너 이미지 레퍼런스 (예: `alpine:3.19`)
    Image(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(path) => write!(f, "dir:{}", path.display()),
            Self::Image(reference) => write!(f, "image:{reference}"),
        }
    }
}

/// 심각도 레벨
///
/// 취약점의 정규화된 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다
/// (`Unknown < Low < Medium < High < Critical`).
/// 소스별 어휘를 이 다섯 단계로 매핑하는 테이블은 scan-engine의
/// `SeverityMap`이 담당합니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 알 수 없는 심각도 — 매핑 실패 시 기본값
    #[default]
    Unknown,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다. 알 수 없는 문자열은 `None`을
    /// 반환하며, 호출자가 `Unknown` 처리 여부를 결정합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" | "negligible" => Some(Self::Low),
            "medium" | "moderate" | "med" => Some(Self::Medium),
            "high" | "important" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            "unknown" | "none" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 패키지 식별자 — `(ecosystem, name, version)` 삼중쌍
///
/// SBOM 내 패키지 유일성과 Finding의 패키지 참조가 모두 이 키를
/// 기준으로 합니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageId {
    /// 패키지 생태계 (npm, cargo, pypi 등 — 소문자 정규화)
    pub ecosystem: String,
    /// 패키지명
    pub name: String,
    /// 버전 문자열
    pub version: String,
}

impl PackageId {
    /// 생태계 문자열을 소문자로 정규화하여 식별자를 생성합니다.
    pub fn new(
        ecosystem: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            ecosystem: ecosystem.into().to_lowercase(),
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.ecosystem, self.name, self.version)
    }
}

/// SBOM 패키지 엔트리
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// 패키지명
    pub name: String,
    /// 버전 문자열
    pub version: String,
    /// 패키지 생태계 (소문자 정규화)
    pub ecosystem: String,
    /// 발견 위치 (manifest 경로 등, 생성 도구가 제공할 경우)
    pub source_location: Option<String>,
}

impl Package {
    /// 패키지 식별자를 반환합니다.
    pub fn id(&self) -> PackageId {
        PackageId::new(self.ecosystem.clone(), self.name.clone(), self.version.clone())
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.ecosystem, self.name, self.version)
    }
}

/// SBOM — 생성 도구가 산출한 패키지 목록 스냅샷
///
/// 패키지 유일성은 생성 도구가 보장하며 여기서 재검증하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sbom {
    /// 패키지 목록 (생성 도구의 출력 순서 유지)
    pub packages: Vec<Package>,
}

impl Sbom {
    /// 패키지 목록으로 SBOM을 생성합니다.
    pub fn new(packages: Vec<Package>) -> Self {
        Self { packages }
    }

    /// 패키지 수를 반환합니다.
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// 식별자가 일치하는 패키지를 찾습니다.
    pub fn find(&self, id: &PackageId) -> Option<&Package> {
        self.packages.iter().find(|p| &p.id() == id)
    }

    /// 식별자가 SBOM에 존재하는지 확인합니다.
    pub fn contains(&self, id: &PackageId) -> bool {
        self.find(id).is_some()
    }
}

/// Finding 식별 키 — `(취약점 ID, 패키지 식별자)`
///
/// 병합 단계에서 같은 키를 가진 Finding들이 하나로 합쳐집니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FindingKey {
    /// 취약점 ID (CVE, GHSA 등)
    pub vuln_id: String,
    /// 영향받는 패키지 식별자
    pub package: PackageId,
}

impl fmt::Display for FindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.vuln_id, self.package)
    }
}

/// 정규화된 취약점 Finding
///
/// 어댑터 고유 스키마가 정규화 단계를 거쳐 도달하는 표준 형태입니다.
/// `sources`는 비어 있을 수 없으며, `severity`는 소스들이 보고한
/// 심각도의 최댓값입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 취약점 ID
    pub vuln_id: String,
    /// 영향받는 패키지 (잡의 SBOM 스냅샷에 존재함이 보장됨)
    pub package: PackageId,
    /// 정규화된 심각도
    pub severity: Severity,
    /// 수정된 버전 (있을 경우)
    pub fixed_version: Option<String>,
    /// 이 Finding을 보고한 어댑터/소스 집합 (항상 비어 있지 않음)
    pub sources: BTreeSet<String>,
    /// 취약점 설명
    pub description: String,
}

impl Finding {
    /// 병합 키를 반환합니다.
    pub fn key(&self) -> FindingKey {
        FindingKey {
            vuln_id: self.vuln_id.clone(),
            package: self.package.clone(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} (fixed: {})",
            self.vuln_id,
            self.severity,
            self.package,
            self.fixed_version.as_deref().unwrap_or("N/A"),
        )
    }
}

/// 비치명적 이상 항목의 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// Finding이 참조한 패키지가 잡의 SBOM에 존재하지 않음
    OrphanPackage,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrphanPackage => write!(f, "orphan-package"),
        }
    }
}

/// 정규화 단계에서 기록되는 비치명적 이상 항목
///
/// 배치를 중단시키지 않으며, 최종 보고서의 이상 목록으로 노출됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    /// 이상 종류
    pub kind: AnomalyKind,
    /// 보고한 어댑터/소스명
    pub source: String,
    /// 관련 취약점 ID
    pub vuln_id: String,
    /// 해석에 실패한 패키지 식별자
    pub package: PackageId,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} reported {} on unresolvable {}",
            self.kind, self.source, self.vuln_id, self.package,
        )
    }
}
