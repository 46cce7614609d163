//! 결과 정규화
//!
//! 소스 원형 [`RawFinding`]을 표준 [`Finding`]으로 변환합니다.
//! 변환 과정에서 두 가지를 보장합니다:
//!
//! 1. **패키지 해석**: Finding의 패키지 참조가 해당 잡의 SBOM
//!    스냅샷에 실제로 존재해야 합니다. 해석에 실패한 항목은
//!    배치를 중단시키지 않고 [`Anomaly`]로 기록됩니다.
//! 2. **심각도 매핑**: 소스 어휘를 오버라이드 테이블 우선,
//!    내장 매핑 차선으로 표준 [`Severity`]에 매핑합니다.
//!    어느 쪽에도 없으면 `Unknown`입니다 (항목 탈락 없음).

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use vulnhawk_core::types::{Anomaly, AnomalyKind, Finding, PackageId, Sbom, Severity};

use crate::adapter::RawFinding;

/// 소스 심각도 어휘 → 표준 심각도 매핑 테이블
///
/// 오버라이드 테이블이 내장 매핑([`Severity::from_str_loose`])보다
/// 우선합니다. 키는 소문자로 정규화되어 있어야 합니다
/// ([`ScanEngineConfig::from_core`](crate::config::ScanEngineConfig::from_core)가 보장).
#[derive(Debug, Clone, Default)]
pub struct SeverityMap {
    overrides: HashMap<String, Severity>,
}

impl SeverityMap {
    /// 오버라이드 테이블로 매핑을 생성합니다.
    pub fn new(overrides: HashMap<String, Severity>) -> Self {
        Self { overrides }
    }

    /// 소스 심각도 문자열을 표준 심각도로 해석합니다.
    ///
    /// 심각도 미보고(`None`)와 미지 어휘는 모두 `Unknown`입니다.
    pub fn resolve(&self, raw: Option<&str>) -> Severity {
        let Some(raw) = raw else {
            return Severity::Unknown;
        };

        let key = raw.to_lowercase();
        if let Some(severity) = self.overrides.get(&key) {
            return *severity;
        }

        match Severity::from_str_loose(raw) {
            Some(severity) => severity,
            None => {
                warn!(raw, "unmapped severity vocabulary, defaulting to Unknown");
                Severity::Unknown
            }
        }
    }
}

/// 정규화기
///
/// 소스별 원형 Finding을 SBOM 스냅샷에 대해 검증하고 표준 형태로
/// 변환합니다.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    severity_map: SeverityMap,
}

impl Normalizer {
    /// 심각도 매핑으로 정규화기를 생성합니다.
    pub fn new(severity_map: SeverityMap) -> Self {
        Self { severity_map }
    }

    /// 원형 Finding 하나를 정규화합니다.
    ///
    /// 소스 표기는 원형 Finding이 밝힌 출처를 우선하고, 없으면
    /// `tool_name`으로 대체합니다. 출처가 다른 동일 키 Finding은
    /// 병합 단계에서 소스 집합으로 합산됩니다.
    ///
    /// 패키지가 SBOM에 없으면 `Err(Anomaly)`를 반환합니다.
    /// 이는 비치명적 결과이며 호출자가 이상 목록에 수집합니다.
    pub fn normalize(
        &self,
        raw: &RawFinding,
        sbom: &Sbom,
        tool_name: &str,
    ) -> Result<Finding, Anomaly> {
        let source = raw
            .source
            .clone()
            .unwrap_or_else(|| tool_name.to_owned());
        let package = PackageId::new(
            raw.ecosystem.clone(),
            raw.package_name.clone(),
            raw.package_version.clone(),
        );

        if !sbom.contains(&package) {
            return Err(Anomaly {
                kind: AnomalyKind::OrphanPackage,
                source,
                vuln_id: raw.vuln_id.clone(),
                package,
            });
        }

        // 빈 수정 버전 문자열은 "수정 없음"으로 취급
        let fixed_version = raw
            .fixed_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(|v| v.to_owned());

        Ok(Finding {
            vuln_id: raw.vuln_id.clone(),
            package,
            severity: self.severity_map.resolve(raw.severity.as_deref()),
            fixed_version,
            sources: BTreeSet::from([source]),
            description: raw.description.clone(),
        })
    }

    /// 원형 Finding 배치를 정규화합니다.
    ///
    /// 이상 항목은 배치를 중단시키지 않고 별도 목록으로 수집됩니다.
    pub fn normalize_batch(
        &self,
        raws: &[RawFinding],
        sbom: &Sbom,
        tool_name: &str,
    ) -> (Vec<Finding>, Vec<Anomaly>) {
        let mut findings = Vec::with_capacity(raws.len());
        let mut anomalies = Vec::new();

        for raw in raws {
            match self.normalize(raw, sbom, tool_name) {
                Ok(finding) => findings.push(finding),
                Err(anomaly) => {
                    warn!(%anomaly, "orphan finding recorded");
                    anomalies.push(anomaly);
                }
            }
        }

        debug!(
            tool_name,
            finding_count = findings.len(),
            anomaly_count = anomalies.len(),
            "batch normalized"
        );
        (findings, anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnhawk_core::types::Package;

    fn sbom_with(name: &str, version: &str, ecosystem: &str) -> Sbom {
        Sbom::new(vec![Package {
            name: name.to_owned(),
            version: version.to_owned(),
            ecosystem: ecosystem.to_owned(),
            source_location: None,
        }])
    }

    fn raw(name: &str, version: &str, ecosystem: &str) -> RawFinding {
        RawFinding {
            vuln_id: "CVE-2024-0001".to_owned(),
            package_name: name.to_owned(),
            package_version: version.to_owned(),
            ecosystem: ecosystem.to_owned(),
            severity: Some("high".to_owned()),
            fixed_version: Some("2.0.0".to_owned()),
            description: "test vuln".to_owned(),
            source: None,
        }
    }

    #[test]
    fn resolves_builtin_vocabulary_case_insensitively() {
        let map = SeverityMap::default();
        assert_eq!(map.resolve(Some("high")), Severity::High);
        assert_eq!(map.resolve(Some("HIGH")), Severity::High);
        assert_eq!(map.resolve(Some("Moderate")), Severity::Medium);
    }

    #[test]
    fn unmapped_vocabulary_is_unknown_not_dropped() {
        let map = SeverityMap::default();
        assert_eq!(map.resolve(Some("P0-URGENT")), Severity::Unknown);
        assert_eq!(map.resolve(None), Severity::Unknown);
    }

    #[test]
    fn override_table_wins_over_builtin() {
        let map = SeverityMap::new(HashMap::from([("high".to_owned(), Severity::Critical)]));
        assert_eq!(map.resolve(Some("HIGH")), Severity::Critical);
        // 오버라이드에 없는 어휘는 내장 매핑으로
        assert_eq!(map.resolve(Some("low")), Severity::Low);
    }

    #[test]
    fn override_extends_vocabulary() {
        let map = SeverityMap::new(HashMap::from([("p0".to_owned(), Severity::Critical)]));
        assert_eq!(map.resolve(Some("P0")), Severity::Critical);
    }

    #[test]
    fn normalizes_resolved_package() {
        let normalizer = Normalizer::default();
        let sbom = sbom_with("left-pad", "1.0.0", "npm");
        let finding = normalizer
            .normalize(&raw("left-pad", "1.0.0", "npm"), &sbom, "osv-scanner")
            .unwrap();

        assert_eq!(finding.vuln_id, "CVE-2024-0001");
        assert_eq!(finding.package, PackageId::new("npm", "left-pad", "1.0.0"));
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.fixed_version.as_deref(), Some("2.0.0"));
        assert_eq!(finding.sources, BTreeSet::from(["osv-scanner".to_owned()]));
    }

    #[test]
    fn orphan_package_becomes_anomaly() {
        let normalizer = Normalizer::default();
        let sbom = sbom_with("left-pad", "1.0.0", "npm");
        let anomaly = normalizer
            .normalize(&raw("ghost-pkg", "9.9.9", "npm"), &sbom, "osv-scanner")
            .unwrap_err();

        assert_eq!(anomaly.kind, AnomalyKind::OrphanPackage);
        assert_eq!(anomaly.source, "osv-scanner");
        assert_eq!(anomaly.package, PackageId::new("npm", "ghost-pkg", "9.9.9"));
    }

    #[test]
    fn version_mismatch_is_orphan() {
        // 이름이 같아도 버전이 다르면 해석 실패
        let normalizer = Normalizer::default();
        let sbom = sbom_with("left-pad", "1.0.0", "npm");
        assert!(
            normalizer
                .normalize(&raw("left-pad", "1.0.1", "npm"), &sbom, "osv")
                .is_err()
        );
    }

    #[test]
    fn ecosystem_case_differences_still_resolve() {
        let normalizer = Normalizer::default();
        let sbom = sbom_with("requests", "2.31.0", "pypi");
        // 소스가 PyPI로 보고해도 소문자 정규화로 일치
        assert!(
            normalizer
                .normalize(&raw("requests", "2.31.0", "PyPI"), &sbom, "osv")
                .is_ok()
        );
    }

    #[test]
    fn empty_fixed_version_becomes_none() {
        let normalizer = Normalizer::default();
        let sbom = sbom_with("left-pad", "1.0.0", "npm");
        let mut input = raw("left-pad", "1.0.0", "npm");
        input.fixed_version = Some(String::new());
        let finding = normalizer.normalize(&input, &sbom, "osv").unwrap();
        assert_eq!(finding.fixed_version, None);
    }

    #[test]
    fn payload_source_wins_over_tool_name() {
        let normalizer = Normalizer::default();
        let sbom = sbom_with("left-pad", "1.0.0", "npm");
        let mut input = raw("left-pad", "1.0.0", "npm");
        input.source = Some("lockfile:/srv/app/package-lock.json".to_owned());

        let finding = normalizer.normalize(&input, &sbom, "osv-scanner").unwrap();
        assert_eq!(
            finding.sources,
            BTreeSet::from(["lockfile:/srv/app/package-lock.json".to_owned()])
        );
    }

    #[test]
    fn same_key_findings_from_two_sources_fuse_into_one() {
        // 같은 (취약점, 패키지) 키를 두 출처가 다른 표기 심각도로
        // 보고하면 소스 집합 크기 2, 최대 심각도 하나로 병합
        let normalizer = Normalizer::default();
        let sbom = sbom_with("left-pad", "1.0.0", "npm");

        let mut first = raw("left-pad", "1.0.0", "npm");
        first.severity = Some("high".to_owned());
        first.source = Some("osv-a".to_owned());
        let mut second = raw("left-pad", "1.0.0", "npm");
        second.severity = Some("HIGH".to_owned());
        second.source = Some("osv-b".to_owned());

        let (findings, anomalies) =
            normalizer.normalize_batch(&[first, second], &sbom, "osv-scanner");
        assert!(anomalies.is_empty());

        let merged = crate::merge::merge(findings);
        assert_eq!(merged.len(), 1);
        let fused = merged.values().next().unwrap();
        assert_eq!(fused.severity, Severity::High);
        assert_eq!(fused.sources.len(), 2);
        assert!(fused.sources.contains("osv-a"));
        assert!(fused.sources.contains("osv-b"));
    }

    #[test]
    fn batch_partitions_findings_and_anomalies() {
        let normalizer = Normalizer::default();
        let sbom = sbom_with("left-pad", "1.0.0", "npm");
        let raws = vec![
            raw("left-pad", "1.0.0", "npm"),
            raw("ghost", "0.1", "npm"),
            raw("left-pad", "1.0.0", "npm"),
        ];

        let (findings, anomalies) = normalizer.normalize_batch(&raws, &sbom, "osv");
        assert_eq!(findings.len(), 2);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].package.name, "ghost");
    }
}
