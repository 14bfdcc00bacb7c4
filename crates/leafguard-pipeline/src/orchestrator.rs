//! 파이프라인 오케스트레이터.
//!
//! `run_once`는 캡처 → 판별 → 판정 → 구동을 순서대로 실행하고,
//! 성공/실패와 관계없이 결과를 실행 기록으로 남긴 뒤 반환한다.
//!
//! - 캡처/판별 실패는 호출자에게 에러로 전파하지 않고 실패 기록으로 강등한다.
//! - 판별 실패 시 구동기는 호출되지 않는다.
//! - 구동 실패는 `ActuationOutcome`에 기록되며 실행 자체는 성공으로 남는다.
//! - 기록 저장 실패만 `Err`로 반환한다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use leafguard_core::config::AppConfig;
use leafguard_core::decision::DecisionPolicy;
use leafguard_core::error::{CoreError, DetectionFailure};
use leafguard_core::models::actuation::ActuationTarget;
use leafguard_core::models::capture::{CaptureResult, CaptureSource, CaptureSummary};
use leafguard_core::models::decision::Decision;
use leafguard_core::models::detection::{BackendKind, DetectionResult};
use leafguard_core::models::run::{RunRecord, RunStage, RunStatus};
use leafguard_core::ports::actuator::Actuator;
use leafguard_core::ports::capture::CaptureProvider;
use leafguard_core::ports::detection::DetectionBackend;
use leafguard_core::ports::run_log::RunLog;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 단계별 제한 시간
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub capture: Duration,
    pub detection: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            capture: Duration::from_secs(15),
            detection: Duration::from_secs(15),
        }
    }
}

impl StageTimeouts {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            capture: config.capture_timeout(),
            detection: config.detection_timeout(),
        }
    }
}

/// 파이프라인 오케스트레이터
pub struct PipelineOrchestrator {
    capture: Arc<dyn CaptureProvider>,
    detector: Arc<dyn DetectionBackend>,
    policy: DecisionPolicy,
    actuator: Arc<dyn Actuator>,
    run_log: Arc<dyn RunLog>,
    timeouts: StageTimeouts,
}

/// 실행 중 공통 메타데이터
struct RunContext {
    run_id: Uuid,
    timestamp: DateTime<Utc>,
    started: Instant,
}

impl RunContext {
    fn begin() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn failed(
        &self,
        stage: RunStage,
        error: &CoreError,
        capture: Option<CaptureSummary>,
    ) -> RunRecord {
        RunRecord {
            id: None,
            run_id: self.run_id,
            status: RunStatus::Failed,
            failed_stage: Some(stage),
            failure_reason: Some(error.to_string()),
            capture,
            detection: None,
            decision: Decision::off(),
            actuation: None,
            elapsed_ms: self.elapsed_ms(),
            timestamp: self.timestamp,
        }
    }
}

impl PipelineOrchestrator {
    pub fn new(
        capture: Arc<dyn CaptureProvider>,
        detector: Arc<dyn DetectionBackend>,
        policy: DecisionPolicy,
        actuator: Arc<dyn Actuator>,
        run_log: Arc<dyn RunLog>,
    ) -> Self {
        Self {
            capture,
            detector,
            policy,
            actuator,
            run_log,
            timeouts: StageTimeouts::default(),
        }
    }

    /// 단계별 제한 시간 지정
    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// 판별 백엔드 종류
    pub fn backend_kind(&self) -> BackendKind {
        self.detector.backend_kind()
    }

    /// 캡처 소스 종류
    pub fn source_kind(&self) -> CaptureSource {
        self.capture.source_kind()
    }

    /// 구동 대상
    pub fn actuation_target(&self) -> ActuationTarget {
        self.actuator.target()
    }

    /// 실행 기록 저장소
    pub fn run_log(&self) -> &Arc<dyn RunLog> {
        &self.run_log
    }

    /// 파이프라인 1회 실행
    ///
    /// 반환된 기록은 이미 저장되어 있으며 `id`가 채워져 있다.
    pub async fn run_once(&self) -> Result<RunRecord, CoreError> {
        let ctx = RunContext::begin();
        info!(run_id = %ctx.run_id, "파이프라인 실행 시작");

        let record = self.execute(&ctx).await;
        self.persist(record).await
    }

    async fn execute(&self, ctx: &RunContext) -> RunRecord {
        let capture = match self.capture_stage().await {
            Ok(capture) => capture,
            Err(e) => {
                warn!(run_id = %ctx.run_id, stage = "capture", "캡처 실패: {e}");
                return ctx.failed(RunStage::Capture, &e, None);
            }
        };
        let capture_summary = capture.summary();
        debug!(
            run_id = %ctx.run_id,
            source = %capture.source_kind.as_str(),
            bytes = capture.image_bytes.len(),
            file = ?capture.file_reference,
            "캡처 완료"
        );

        let detection = match self.detection_stage(&capture).await {
            Ok(detection) => detection,
            Err(e) => {
                warn!(run_id = %ctx.run_id, stage = "detection", "판별 실패: {e}");
                return ctx.failed(RunStage::Detection, &e, Some(capture_summary));
            }
        };
        // 이미지 바이트는 판별 이후 필요 없음
        drop(capture);

        let decision = self.policy.decide(&detection);
        info!(
            run_id = %ctx.run_id,
            disease = %detection.disease_label,
            severity = detection.severity,
            action = %decision.action.as_str(),
            duration_ms = decision.duration_ms,
            "판정 완료"
        );

        let actuation = self.actuator.actuate(&decision).await;
        if let Some(err) = &actuation.error {
            warn!(run_id = %ctx.run_id, "구동 실패: {err}");
        }

        RunRecord {
            id: None,
            run_id: ctx.run_id,
            status: RunStatus::Success,
            failed_stage: None,
            failure_reason: None,
            capture: Some(capture_summary),
            detection: Some(detection),
            decision,
            actuation: Some(actuation),
            elapsed_ms: ctx.elapsed_ms(),
            timestamp: ctx.timestamp,
        }
    }

    async fn capture_stage(&self) -> Result<CaptureResult, CoreError> {
        let limit = self.timeouts.capture;
        match timeout(limit, self.capture.capture()).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Capture(format!(
                "capture timed out after {}ms",
                limit.as_millis()
            ))),
        }
    }

    async fn detection_stage(
        &self,
        capture: &CaptureResult,
    ) -> Result<DetectionResult, CoreError> {
        let limit = self.timeouts.detection;
        match timeout(limit, self.detector.detect(capture)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::detection(
                DetectionFailure::Timeout,
                format!(
                    "{} backend timed out after {}ms",
                    self.detector.backend_kind().as_str(),
                    limit.as_millis()
                ),
            )),
        }
    }

    async fn persist(&self, mut record: RunRecord) -> Result<RunRecord, CoreError> {
        match self.run_log.append(&record).await {
            Ok(id) => {
                record.id = Some(id);
                info!(
                    run_id = %record.run_id,
                    id,
                    status = ?record.status,
                    elapsed_ms = record.elapsed_ms,
                    "실행 기록 저장"
                );
                Ok(record)
            }
            Err(e) => {
                error!(run_id = %record.run_id, "실행 기록 저장 실패: {e}");
                Err(e)
            }
        }
    }
}
