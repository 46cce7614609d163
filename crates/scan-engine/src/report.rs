//! 집계 보고서
//!
//! 잡이 성공적으로 완료되면 병합 결과와 이상 목록이
//! [`AggregatedReport`]로 고정됩니다. 보고서는 불변이며 조회 시
//! `Arc` 공유로 전달됩니다.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use vulnhawk_core::types::{Anomaly, Finding, FindingKey, Sbom, Severity, Target};

/// 심각도별 Finding 개수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// Critical 개수
    pub critical: usize,
    /// High 개수
    pub high: usize,
    /// Medium 개수
    pub medium: usize,
    /// Low 개수
    pub low: usize,
    /// Unknown 개수
    pub unknown: usize,
}

impl SeverityCounts {
    /// Finding 목록에서 심각도별 개수를 집계합니다.
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    /// 전체 Finding 수를 반환합니다.
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.unknown
    }
}

/// 잡 하나의 최종 스캔 보고서
///
/// `findings`는 `(취약점 ID, 패키지)` 키 순으로 정렬되어 있어
/// 같은 입력에 대해 항상 같은 직렬화 결과를 냅니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedReport {
    /// 잡 ID
    pub job_id: String,
    /// 스캔 대상
    pub target: Target,
    /// 잡이 스캔한 SBOM 스냅샷
    pub sbom: Sbom,
    /// 병합된 Finding 목록 (키 순 정렬)
    pub findings: Vec<Finding>,
    /// 심각도별 집계
    pub severity_counts: SeverityCounts,
    /// 정규화 단계에서 수집된 비치명적 이상 목록
    pub anomalies: Vec<Anomaly>,
    /// 보고서 생성 시각 (unix epoch 초)
    pub generated_at_epoch_secs: u64,
}

impl AggregatedReport {
    /// 병합 결과로 보고서를 생성합니다.
    pub fn new(
        job_id: impl Into<String>,
        target: Target,
        sbom: Sbom,
        merged: BTreeMap<FindingKey, Finding>,
        anomalies: Vec<Anomaly>,
    ) -> Self {
        // BTreeMap 순회가 키 정렬 순서를 보장
        let findings: Vec<Finding> = merged.into_values().collect();
        let severity_counts = SeverityCounts::tally(&findings);

        Self {
            job_id: job_id.into(),
            target,
            sbom,
            findings,
            severity_counts,
            anomalies,
            generated_at_epoch_secs: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// SBOM 스냅샷의 패키지 수를 반환합니다.
    pub fn package_count(&self) -> usize {
        self.sbom.package_count()
    }

    /// Finding이 하나라도 있는지 반환합니다.
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    /// 보고서 내 최고 심각도를 반환합니다 (Finding이 없으면 `None`).
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}
