//! Finding 병합
//!
//! 같은 `(취약점 ID, 패키지)` 키를 가진 Finding들을 하나로 합칩니다.
//! 병합은 순수 함수이며 입력 순서와 무관하게 결정적입니다:
//! 쌍별 병합이 교환적·결합적·멱등적이므로 어떤 순서로 접어도
//! 같은 결과가 나옵니다.
//!
//! # 필드별 규칙
//!
//! - **severity**: 최댓값 (보수적 선택)
//! - **sources**: 합집합
//! - **fixed_version**: 값이 있는 쪽 우선, 둘 다 있으면 사전순 최댓값
//! - **description**: 사전순 최댓값 (순서 독립성을 위한 타이브레이크)

use std::collections::BTreeMap;

use tracing::debug;

use vulnhawk_core::types::{Finding, FindingKey};

/// Finding 집합을 키별로 병합합니다.
///
/// 반환 맵은 키 순서로 정렬되어 있어 출력이 결정적입니다.
pub fn merge(findings: impl IntoIterator<Item = Finding>) -> BTreeMap<FindingKey, Finding> {
    let mut merged: BTreeMap<FindingKey, Finding> = BTreeMap::new();

    let mut input_count = 0usize;
    for finding in findings {
        input_count += 1;
        match merged.entry(finding.key()) {
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(finding);
            }
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                *existing = merge_pair(existing.clone(), finding);
            }
        }
    }

    debug!(
        input_count,
        merged_count = merged.len(),
        "findings merged"
    );
    merged
}

/// 같은 키를 가진 두 Finding을 병합합니다.
///
/// 호출자가 키 일치를 보장합니다. 교환적이고 결합적이며 멱등적입니다.
fn merge_pair(a: Finding, b: Finding) -> Finding {
    let mut sources = a.sources;
    sources.extend(b.sources);

    Finding {
        vuln_id: a.vuln_id,
        package: a.package,
        severity: a.severity.max(b.severity),
        fixed_version: merge_fixed_version(a.fixed_version, b.fixed_version),
        sources,
        description: if b.description > a.description {
            b.description
        } else {
            a.description
        },
    }
}

fn merge_fixed_version(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b > a { b } else { a }),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}
