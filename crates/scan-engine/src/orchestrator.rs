//! 스캔 오케스트레이터
//!
//! 잡 제출부터 보고서 고정까지의 파이프라인 전체를 감독합니다.
//!
//! # 동시성 모델
//!
//! - 잡 내부 단계는 순차 실행됩니다 (각 단계가 이전 단계의 출력에
//!   의존).
//! - 잡 간 동시성은 [`Semaphore`] 허가로 제한됩니다. 허가는 첫 단계
//!   시작 전에 획득하고 터미널 도달 시 반환합니다.
//! - 공유 가변 상태는 잡 레지스트리 하나이며, 뮤텍스 임계 구역은
//!   상태 전이와 스냅샷 복사로 한정됩니다. 도구 실행 중에는 잠금을
//!   잡지 않습니다.
//!
//! # 취소
//!
//! 잡마다 [`CancellationToken`]을 가집니다. 취소되면 대기 중인
//! 어댑터 future가 드롭되어 자식 프로세스가 종료되고, 잡은
//! `Cancelled` 터미널로 고정됩니다. 이미 터미널인 잡의 취소는
//! 무시됩니다.
//!
//! # 재시도
//!
//! 어댑터 호출은 [`AdapterError::is_retryable`]가 참인 실패
//! (타임아웃)에 한해 `max_retries`회까지 추가 호출됩니다. 잡 단계
//! 전체를 되감지 않고 실패한 호출만 다시 시도합니다.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vulnhawk_core::types::Target;

use crate::adapter::{SbomGenerator, SbomToolAdapter, VulnMatcher, VulnToolAdapter};
use crate::config::ScanEngineConfig;
use crate::error::{AdapterError, ScanEngineError};
use crate::job::{JobFailure, JobStatus, ScanJob};
use crate::merge::merge;
use crate::normalize::{Normalizer, SeverityMap};
use crate::report::AggregatedReport;

/// 상태 전이 알림 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    /// 잡 ID
    pub job_id: String,
    /// 전이된 상태
    pub status: JobStatus,
}

/// 보고서 조회 결과
#[derive(Debug, Clone)]
pub enum ReportStatus {
    /// 잡 완료, 보고서 사용 가능
    Ready(Arc<AggregatedReport>),
    /// 잡 진행 중 (현재 상태 포함)
    NotReady(JobStatus),
    /// 잡 실패 (원인 포함)
    Failed(JobFailure),
    /// 잡 취소됨
    Cancelled,
}

/// 레지스트리 엔트리 — 잡 상태, 보고서 슬롯, 취소 토큰
struct JobEntry {
    job: ScanJob,
    report: Option<Arc<AggregatedReport>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

struct Inner<S, V> {
    sbom: S,
    vuln: V,
    normalizer: Normalizer,
    registry: Mutex<HashMap<String, JobEntry>>,
    permits: Semaphore,
    max_retries: u32,
    events: Option<mpsc::Sender<JobEvent>>,
}

impl<S, V> Inner<S, V> {
    fn emit(&self, job_id: &str, status: JobStatus) {
        if let Some(tx) = &self.events {
            let event = JobEvent {
                job_id: job_id.to_owned(),
                status,
            };
            if tx.try_send(event).is_err() {
                warn!(job_id, "job event channel full or closed, dropping event");
            }
        }
    }
}

impl<S, V> Inner<S, V>
where
    S: SbomGenerator + Send + Sync + 'static,
    V: VulnMatcher + Send + Sync + 'static,
{
    /// 잡을 다음 상태로 전이합니다.
    ///
    /// 전이 거부(동시 취소 등)는 `false`를 반환하며, 호출 태스크는
    /// 조용히 종료해야 합니다.
    async fn advance(&self, job_id: &str, next: JobStatus) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(entry) = registry.get_mut(job_id) else {
            return false;
        };
        if entry.job.transition(next).is_err() {
            debug!(job_id, status = %entry.job.status, "transition rejected, stopping job task");
            return false;
        }
        self.emit(job_id, next);
        true
    }

    async fn fail_job(&self, job_id: &str, failure: JobFailure) {
        let mut registry = self.registry.lock().await;
        if let Some(entry) = registry.get_mut(job_id) {
            warn!(job_id, kind = ?failure.kind, message = failure.message.as_str(), "job failed");
            entry.job.fail(failure);
            self.emit(job_id, JobStatus::Failed);
            counter!("vulnhawk_jobs_failed_total").increment(1);
        }
    }

    async fn mark_cancelled(&self, job_id: &str) {
        let mut registry = self.registry.lock().await;
        if let Some(entry) = registry.get_mut(job_id) {
            entry.job.cancel();
            if entry.job.status == JobStatus::Cancelled {
                info!(job_id, "job cancelled");
                self.emit(job_id, JobStatus::Cancelled);
                counter!("vulnhawk_jobs_cancelled_total").increment(1);
            }
        }
    }

    /// 잡 파이프라인을 실행합니다.
    ///
    /// 동시성 허가 획득과 각 어댑터 대기 지점에서 취소에 반응합니다.
    async fn run_job(self: Arc<Self>, job_id: String, cancel: CancellationToken) {
        // 허가 대기 중에도 취소 가능해야 함
        let _permit = tokio::select! {
            _ = cancel.cancelled() => {
                self.mark_cancelled(&job_id).await;
                return;
            }
            permit = self.permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    self.fail_job(&job_id, JobFailure::internal("job semaphore closed"))
                        .await;
                    return;
                }
            },
        };

        let target = {
            let registry = self.registry.lock().await;
            let Some(entry) = registry.get(&job_id) else {
                return;
            };
            entry.job.target.clone()
        };

        // 1단계: SBOM 생성
        if !self.advance(&job_id, JobStatus::GeneratingSbom).await {
            return;
        }
        let sbom = tokio::select! {
            _ = cancel.cancelled() => {
                self.mark_cancelled(&job_id).await;
                return;
            }
            result = run_with_retry(self.max_retries, self.sbom.tool_name(), || {
                self.sbom.generate(&target)
            }) => result,
        };
        let sbom = match sbom {
            Ok(sbom) => sbom,
            Err(e) => {
                self.fail_job(&job_id, JobFailure::from_adapter(&e)).await;
                return;
            }
        };

        // 2단계: 취약점 스캔
        if !self.advance(&job_id, JobStatus::Scanning).await {
            return;
        }
        let raws = tokio::select! {
            _ = cancel.cancelled() => {
                self.mark_cancelled(&job_id).await;
                return;
            }
            result = run_with_retry(self.max_retries, self.vuln.tool_name(), || {
                self.vuln.match_vulnerabilities(&sbom)
            }) => result,
        };
        let raws = match raws {
            Ok(raws) => raws,
            Err(e) => {
                self.fail_job(&job_id, JobFailure::from_adapter(&e)).await;
                return;
            }
        };

        // 3단계: 정규화 (도구 호출 없음, 취소 지점 아님)
        if !self.advance(&job_id, JobStatus::Normalizing).await {
            return;
        }
        let (findings, anomalies) =
            self.normalizer
                .normalize_batch(&raws, &sbom, self.vuln.tool_name());

        // 4단계: 병합 및 보고서 고정
        if !self.advance(&job_id, JobStatus::Merging).await {
            return;
        }
        let merged = merge(findings);
        let report = AggregatedReport::new(job_id.clone(), target, sbom, merged, anomalies);

        let mut registry = self.registry.lock().await;
        if let Some(entry) = registry.get_mut(&job_id) {
            // 보고서 저장과 Complete 전이는 같은 임계 구역에서:
            // Complete 상태에서 보고서가 없는 순간이 관측되지 않음
            if entry.job.transition(JobStatus::Complete).is_ok() {
                info!(
                    job_id,
                    finding_count = report.findings.len(),
                    anomaly_count = report.anomalies.len(),
                    "job complete"
                );
                entry.report = Some(Arc::new(report));
                self.emit(&job_id, JobStatus::Complete);
                counter!("vulnhawk_jobs_completed_total").increment(1);
            }
        }
    }
}

/// 어댑터 호출을 재시도 정책과 함께 실행합니다.
///
/// `max_retries`는 추가 호출 허용 횟수이며, 총 호출 수는
/// `max_retries + 1`을 넘지 않습니다. 재시도 대상은
/// [`AdapterError::is_retryable`]가 참인 실패뿐입니다.
async fn run_with_retry<T, F, Fut>(
    max_retries: u32,
    tool: &str,
    mut op: F,
) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt <= max_retries => {
                warn!(
                    tool,
                    attempt,
                    max_retries,
                    error = %e,
                    "retryable adapter failure, retrying"
                );
                counter!("vulnhawk_adapter_retries_total").increment(1);
            }
            Err(e) => return Err(e),
        }
    }
}

/// 스캔 오케스트레이터
///
/// 어댑터 쌍에 대해 제네릭이므로 테스트에서 목 어댑터를 주입할 수
/// 있습니다. 핸들은 `Clone`으로 공유됩니다.
pub struct ScanOrchestrator<S, V> {
    inner: Arc<Inner<S, V>>,
}

impl<S, V> Clone for ScanOrchestrator<S, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ScanOrchestrator<SbomToolAdapter, VulnToolAdapter> {
    /// 설정으로부터 실제 도구 어댑터를 가진 오케스트레이터를
    /// 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정 유효성 검증 실패 시 `ScanEngineError::Config`
    pub fn from_config(config: &ScanEngineConfig) -> Result<Self, ScanEngineError> {
        config.validate()?;
        let sbom = SbomToolAdapter::new(&config.sbom_tool_path, config.sbom_timeout);
        let vuln = VulnToolAdapter::new(&config.vuln_tool_path, config.vuln_timeout);
        Ok(Self::builder(sbom, vuln)
            .severity_map(SeverityMap::new(config.severity_overrides.clone()))
            .max_retries(config.max_retries)
            .max_concurrent_jobs(config.max_concurrent_jobs)
            .build())
    }
}

impl<S, V> ScanOrchestrator<S, V>
where
    S: SbomGenerator + Send + Sync + 'static,
    V: VulnMatcher + Send + Sync + 'static,
{
    /// 어댑터 쌍으로 빌더를 생성합니다.
    pub fn builder(sbom: S, vuln: V) -> ScanOrchestratorBuilder<S, V> {
        ScanOrchestratorBuilder {
            sbom,
            vuln,
            severity_map: SeverityMap::default(),
            max_retries: 1,
            max_concurrent_jobs: 4,
            events: None,
        }
    }

    /// 잡을 제출하고 잡 ID를 반환합니다.
    ///
    /// 제출 즉시 반환하며, 파이프라인은 백그라운드 태스크에서
    /// 실행됩니다.
    pub async fn submit(&self, target: Target) -> String {
        let job = ScanJob::new(target);
        let job_id = job.job_id.clone();
        let cancel = CancellationToken::new();

        info!(job_id = job_id.as_str(), target = %job.target, "job submitted");
        counter!("vulnhawk_jobs_submitted_total").increment(1);

        // 태스크의 첫 레지스트리 접근이 엔트리 삽입 이후가 되도록
        // 잠금을 잡은 채 스폰
        let mut registry = self.inner.registry.lock().await;
        let handle = tokio::spawn(Arc::clone(&self.inner).run_job(job_id.clone(), cancel.clone()));
        registry.insert(
            job_id.clone(),
            JobEntry {
                job,
                report: None,
                cancel,
                handle: Some(handle),
            },
        );
        job_id
    }

    /// 잡 상태 스냅샷을 조회합니다.
    ///
    /// # Errors
    ///
    /// 존재하지 않는 잡이면 `JobNotFound`
    pub async fn status(&self, job_id: &str) -> Result<ScanJob, ScanEngineError> {
        let registry = self.inner.registry.lock().await;
        registry
            .get(job_id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| ScanEngineError::JobNotFound {
                job_id: job_id.to_owned(),
            })
    }

    /// 모든 잡의 상태 스냅샷을 반환합니다.
    pub async fn jobs(&self) -> Vec<ScanJob> {
        let registry = self.inner.registry.lock().await;
        registry.values().map(|entry| entry.job.clone()).collect()
    }

    /// 잡 보고서를 조회합니다.
    ///
    /// # Errors
    ///
    /// 존재하지 않는 잡이면 `JobNotFound`
    pub async fn report(&self, job_id: &str) -> Result<ReportStatus, ScanEngineError> {
        let registry = self.inner.registry.lock().await;
        let entry = registry
            .get(job_id)
            .ok_or_else(|| ScanEngineError::JobNotFound {
                job_id: job_id.to_owned(),
            })?;

        Ok(match entry.job.status {
            JobStatus::Complete => match &entry.report {
                Some(report) => ReportStatus::Ready(Arc::clone(report)),
                // Complete 전이와 보고서 저장이 원자적이므로 도달 불가
                None => ReportStatus::NotReady(entry.job.status),
            },
            JobStatus::Failed => ReportStatus::Failed(
                entry
                    .job
                    .failure
                    .clone()
                    .unwrap_or_else(|| JobFailure::internal("failure cause missing")),
            ),
            JobStatus::Cancelled => ReportStatus::Cancelled,
            status => ReportStatus::NotReady(status),
        })
    }

    /// 잡을 취소합니다.
    ///
    /// 이미 터미널인 잡의 취소는 아무 효과가 없습니다.
    ///
    /// # Errors
    ///
    /// 존재하지 않는 잡이면 `JobNotFound`
    pub async fn cancel(&self, job_id: &str) -> Result<(), ScanEngineError> {
        let registry = self.inner.registry.lock().await;
        let entry = registry
            .get(job_id)
            .ok_or_else(|| ScanEngineError::JobNotFound {
                job_id: job_id.to_owned(),
            })?;

        if !entry.job.status.is_terminal() {
            entry.cancel.cancel();
        }
        Ok(())
    }

    /// 잡의 백그라운드 태스크가 끝날 때까지 기다린 뒤 최종 상태를
    /// 반환합니다.
    ///
    /// # Errors
    ///
    /// 존재하지 않는 잡이면 `JobNotFound`
    pub async fn wait(&self, job_id: &str) -> Result<ScanJob, ScanEngineError> {
        let handle = {
            let mut registry = self.inner.registry.lock().await;
            let entry = registry
                .get_mut(job_id)
                .ok_or_else(|| ScanEngineError::JobNotFound {
                    job_id: job_id.to_owned(),
                })?;
            entry.handle.take()
        };

        if let Some(handle) = handle
            && handle.await.is_err()
        {
            warn!(job_id, "job task panicked");
        }
        self.status(job_id).await
    }
}

/// [`ScanOrchestrator`] 빌더
pub struct ScanOrchestratorBuilder<S, V> {
    sbom: S,
    vuln: V,
    severity_map: SeverityMap,
    max_retries: u32,
    max_concurrent_jobs: usize,
    events: Option<mpsc::Sender<JobEvent>>,
}

impl<S, V> ScanOrchestratorBuilder<S, V>
where
    S: SbomGenerator + Send + Sync + 'static,
    V: VulnMatcher + Send + Sync + 'static,
{
    /// 심각도 매핑을 설정합니다.
    pub fn severity_map(mut self, map: SeverityMap) -> Self {
        self.severity_map = map;
        self
    }

    /// 최대 재시도 횟수를 설정합니다.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// 동시 잡 상한을 설정합니다 (최소 1).
    pub fn max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    /// 상태 전이 이벤트 채널을 연결합니다.
    pub fn events(mut self, tx: mpsc::Sender<JobEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// 오케스트레이터를 생성합니다.
    pub fn build(self) -> ScanOrchestrator<S, V> {
        ScanOrchestrator {
            inner: Arc::new(Inner {
                sbom: self.sbom,
                vuln: self.vuln,
                normalizer: Normalizer::new(self.severity_map),
                registry: Mutex::new(HashMap::new()),
                permits: Semaphore::new(self.max_concurrent_jobs),
                max_retries: self.max_retries,
                events: self.events,
            }),
        }
    }
}
