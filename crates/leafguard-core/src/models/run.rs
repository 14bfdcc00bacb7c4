//! 파이프라인 실행 기록 모델.
//!
//! `RunRecord`는 유일하게 영구 저장되는 단위이며 추가만 가능하다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actuation::{ActuationOutcome, SlaveResponse};
use super::capture::CaptureSummary;
use super::decision::{Decision, SprayAction};
use super::detection::DetectionResult;

/// 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// 실패 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Capture,
    Detection,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Detection => "detection",
        }
    }
}

/// 실행 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// 저장소가 부여한 단조 증가 ID (저장 전에는 None)
    #[serde(default)]
    pub id: Option<i64>,
    /// 실행 식별자
    pub run_id: Uuid,
    /// 실행 상태
    pub status: RunStatus,
    /// 실패 단계
    #[serde(default)]
    pub failed_stage: Option<RunStage>,
    /// 실패 사유
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// 캡처 요약 (캡처 실패 시 None)
    #[serde(default)]
    pub capture: Option<CaptureSummary>,
    /// 판별 결과 (판별 실패 시 None)
    #[serde(default)]
    pub detection: Option<DetectionResult>,
    /// 분무 결정 (실패 시 off)
    pub decision: Decision,
    /// 구동 결과 (구동하지 않았으면 None)
    #[serde(default)]
    pub actuation: Option<ActuationOutcome>,
    /// 전체 소요 시간 (밀리초)
    pub elapsed_ms: u64,
    /// 실행 시작 시각
    pub timestamp: DateTime<Utc>,
}

impl RunRecord {
    /// 성공 여부
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// 외부 노출용 요약본
    pub fn summary(&self) -> RunSummary {
        let (disease, severity) = match &self.detection {
            Some(d) => (Some(d.disease_label.clone()), Some(d.severity)),
            None => (None, None),
        };
        let result = match self.status {
            RunStatus::Success => self.decision.tier.result_label().to_string(),
            RunStatus::Failed => "Error".to_string(),
        };

        RunSummary {
            id: self.id,
            run_id: self.run_id,
            status: self.status,
            stage: self.failed_stage,
            reason: self.failure_reason.clone(),
            disease,
            severity,
            result,
            action: self.decision.action,
            duration_ms: self.decision.duration_ms,
            executed: self.actuation.as_ref().map(|a| a.executed),
            actuation_error: self.actuation.as_ref().and_then(|a| a.error.clone()),
            pi_response: self
                .actuation
                .as_ref()
                .and_then(|a| a.remote_status.clone()),
            image_path: self.capture.as_ref().and_then(|c| c.file_reference.clone()),
            elapsed_ms: self.elapsed_ms,
            timestamp: self.timestamp,
        }
    }
}

/// 실행 기록 JSON 투영
///
/// 웹 계층이 그대로 렌더링한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Option<i64>,
    pub run_id: Uuid,
    pub status: RunStatus,
    pub stage: Option<RunStage>,
    pub reason: Option<String>,
    pub disease: Option<String>,
    pub severity: Option<f64>,
    /// "Healthy" / "Diseased (Low)" / "Diseased (High)" / "Error"
    pub result: String,
    pub action: SprayAction,
    pub duration_ms: u64,
    pub executed: Option<bool>,
    pub actuation_error: Option<String>,
    pub pi_response: Option<SlaveResponse>,
    pub image_path: Option<String>,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}
