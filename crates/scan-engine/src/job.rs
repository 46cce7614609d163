//! 잡 상태 머신
//!
//! 스캔 잡 하나의 생명주기를 나타냅니다. 상태 전이는 명시적
//! 전이 테이블([`JobStatus::can_transition_to`])로만 허용되며,
//! 터미널 상태(`Complete`/`Failed`/`Cancelled`)에 도달한 잡은
//! 다시는 변하지 않습니다.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vulnhawk_core::types::Target;

use crate::error::{AdapterError, ScanEngineError};

/// 잡 생명주기 상태
///
/// 정상 경로는 `Pending → GeneratingSbom → Scanning → Normalizing
/// → Merging → Complete`이며, 터미널이 아닌 모든 상태에서
/// `Failed`/`Cancelled`로 이탈할 수 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// 제출됨, 동시성 슬롯 대기 중
    Pending,
    /// SBOM 생성 단계 실행 중
    GeneratingSbom,
    /// 취약점 스캔 단계 실행 중
    Scanning,
    /// 결과 정규화 중
    Normalizing,
    /// Finding 병합 중
    Merging,
    /// 성공 완료 (터미널)
    Complete,
    /// 실패 (터미널)
    Failed,
    /// 취소됨 (터미널)
    Cancelled,
}

impl JobStatus {
    /// 터미널 상태 여부를 반환합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// `next`로의 전이가 허용되는지 반환합니다.
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed | Self::Cancelled => true,
            Self::GeneratingSbom => *self == Self::Pending,
            Self::Scanning => *self == Self::GeneratingSbom,
            Self::Normalizing => *self == Self::Scanning,
            Self::Merging => *self == Self::Normalizing,
            Self::Complete => *self == Self::Merging,
            Self::Pending => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::GeneratingSbom => "generating-sbom",
            Self::Scanning => "scanning",
            Self::Normalizing => "normalizing",
            Self::Merging => "merging",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 단계 도달 시각 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStamp {
    /// 도달한 상태
    pub status: JobStatus,
    /// 도달 시각 (unix epoch 초)
    pub at_epoch_secs: u64,
}

/// 실패 분류
///
/// 상태 조회 API가 실패 원인을 타입으로 노출하기 위한 분류입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// 도구 바이너리를 찾을 수 없음
    ToolNotFound,
    /// 재시도를 소진할 때까지 타임아웃
    ToolTimeout,
    /// 도구가 0이 아닌 코드로 종료
    ToolCrashed,
    /// 도구 출력 파싱 실패
    ToolOutputMalformed,
    /// 엔진 내부 에러
    Internal,
}

impl From<&AdapterError> for FailureKind {
    fn from(err: &AdapterError) -> Self {
        match err {
            AdapterError::ToolNotFound { .. } => Self::ToolNotFound,
            AdapterError::ToolTimeout { .. } => Self::ToolTimeout,
            AdapterError::ToolCrashed { .. } => Self::ToolCrashed,
            AdapterError::ToolOutputMalformed { .. } => Self::ToolOutputMalformed,
        }
    }
}

/// 실패한 잡의 원인 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// 실패 분류
    pub kind: FailureKind,
    /// 사람이 읽을 수 있는 실패 메시지
    pub message: String,
}

impl JobFailure {
    /// 어댑터 에러에서 실패 기록을 생성합니다.
    pub fn from_adapter(err: &AdapterError) -> Self {
        Self {
            kind: FailureKind::from(err),
            message: err.to_string(),
        }
    }

    /// 엔진 내부 에러 기록을 생성합니다.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Internal,
            message: message.into(),
        }
    }
}

/// 스캔 잡
///
/// 대상은 제출 시점에 고정되며, 상태는 전이 테이블을 통해서만
/// 변합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    /// 잡 ID (UUID v4)
    pub job_id: String,
    /// 스캔 대상 (제출 후 불변)
    pub target: Target,
    /// 현재 상태
    pub status: JobStatus,
    /// 실패 시 원인 기록
    pub failure: Option<JobFailure>,
    /// 제출 시각 (unix epoch 초)
    pub submitted_at_epoch_secs: u64,
    /// 단계별 도달 시각 (전이 순서대로)
    pub stage_timestamps: Vec<StageStamp>,
}

impl ScanJob {
    /// 새 잡을 `Pending` 상태로 생성합니다.
    pub fn new(target: Target) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            target,
            status: JobStatus::Pending,
            failure: None,
            submitted_at_epoch_secs: now_epoch_secs(),
            stage_timestamps: Vec::new(),
        }
    }

    fn record_stage(&mut self, status: JobStatus) {
        self.status = status;
        self.stage_timestamps.push(StageStamp {
            status,
            at_epoch_secs: now_epoch_secs(),
        });
    }

    /// 상태를 전이합니다.
    ///
    /// # Errors
    ///
    /// 전이 테이블이 허용하지 않는 전이면 `InvalidTransition`
    pub fn transition(&mut self, next: JobStatus) -> Result<(), ScanEngineError> {
        if !self.status.can_transition_to(next) {
            return Err(ScanEngineError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.record_stage(next);
        Ok(())
    }

    /// 잡을 실패 상태로 전이하고 원인을 기록합니다.
    ///
    /// 이미 터미널이면 아무 것도 하지 않습니다 (취소 경합 시
    /// 먼저 도달한 터미널 상태가 유지됨).
    pub fn fail(&mut self, failure: JobFailure) {
        if self.status.can_transition_to(JobStatus::Failed) {
            self.record_stage(JobStatus::Failed);
            self.failure = Some(failure);
        }
    }

    /// 잡을 취소 상태로 전이합니다.
    ///
    /// 이미 터미널이면 아무 것도 하지 않습니다.
    pub fn cancel(&mut self) {
        if self.status.can_transition_to(JobStatus::Cancelled) {
            self.record_stage(JobStatus::Cancelled);
        }
    }
}
