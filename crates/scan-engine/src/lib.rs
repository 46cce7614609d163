#![doc = include_str!("../README.md")]

pub mod adapter;
pub mod config;
pub mod error;
pub mod job;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod report;

// 주요 타입 재노출
pub use adapter::{RawFinding, SbomGenerator, SbomToolAdapter, VulnMatcher, VulnToolAdapter};
pub use config::{ScanEngineConfig, ScanEngineConfigBuilder};
pub use error::{AdapterError, ScanEngineError};
pub use job::{FailureKind, JobFailure, JobStatus, ScanJob, StageStamp};
pub use merge::merge;
pub use normalize::{Normalizer, SeverityMap};
pub use orchestrator::{JobEvent, ReportStatus, ScanOrchestrator, ScanOrchestratorBuilder};
pub use report::{AggregatedReport, SeverityCounts};
