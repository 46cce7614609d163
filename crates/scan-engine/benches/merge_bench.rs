//! Finding 병합 벤치마크

use std::collections::BTreeSet;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use vulnhawk_core::types::{Finding, PackageId, Severity};
use vulnhawk_scan_engine::merge::merge;

/// 두 소스가 절반씩 겹치게 보고한 Finding 집합을 생성합니다.
fn findings_with_overlap(count: usize) -> Vec<Finding> {
    let mut findings = Vec::with_capacity(count * 2);
    for i in 0..count {
        let package = PackageId::new("npm", format!("pkg-{}", i % (count / 2 + 1)), "1.0.0");
        let vuln_id = format!("CVE-2024-{i:05}");

        findings.push(Finding {
            vuln_id: vuln_id.clone(),
            package: package.clone(),
            severity: Severity::Medium,
            fixed_version: None,
            sources: BTreeSet::from(["osv".to_owned()]),
            description: "first report".to_owned(),
        });
        // 절반은 두 번째 소스가 같은 키로 중복 보고
        if i % 2 == 0 {
            findings.push(Finding {
                vuln_id,
                package,
                severity: Severity::High,
                fixed_version: Some("2.0.0".to_owned()),
                sources: BTreeSet::from(["grype".to_owned()]),
                description: "second report".to_owned(),
            });
        }
    }
    findings
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for size in [100, 1_000, 10_000] {
        let findings = findings_with_overlap(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &findings, |b, input| {
            b.iter(|| merge(black_box(input.clone())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_merge);
criterion_main!(benches);
