//! 외부 도구 어댑터 계층
//!
//! 각 어댑터는 도구 하나를 감싸며 두 가지 책임만 가집니다:
//! 도구 호출 인자 구성과 도구 특화 출력 스키마의 파싱.
//! 서브프로세스 생명주기(생성, 타임아웃, 종료 보장)는
//! [`ToolRunner`]가 공통으로 담당합니다.
//!
//! 오케스트레이터는 [`SbomGenerator`]/[`VulnMatcher`] 트레이트에만
//! 의존하므로 테스트에서 실제 도구 없이 목 어댑터를 주입할 수 있습니다.

mod runner;
mod sbom;
mod vuln;

pub use runner::{RawOutput, ToolRunner, resolve_binary};
pub use sbom::{SbomGenerator, SbomToolAdapter};
pub use vuln::{RawFinding, VulnMatcher, VulnToolAdapter};
