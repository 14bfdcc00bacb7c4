//! 분무기 구동 결과 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::decision::Decision;

/// 구동 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActuationTarget {
    /// 로컬 GPIO 핀 직접 구동
    #[serde(alias = "local")]
    LocalGpio,
    /// 원격 슬레이브 컨트롤러에 위임
    #[serde(alias = "remote")]
    RemoteSlave,
}

impl ActuationTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalGpio => "local-gpio",
            Self::RemoteSlave => "remote-slave",
        }
    }
}

impl fmt::Display for ActuationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 슬레이브 응답 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaveStatus {
    Success,
    Error,
}

/// 슬레이브 `/sprinkle` 응답 본문
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaveResponse {
    /// 처리 결과
    pub status: SlaveStatus,
    /// 사람이 읽을 메시지
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 실제 분무 시간 (밀리초)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// 슬레이브 처리 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SlaveResponse {
    /// 성공 응답 생성
    pub fn success(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: SlaveStatus::Success,
            message: Some(message.into()),
            duration_ms: Some(duration_ms),
            timestamp: Some(Utc::now()),
        }
    }

    /// 실패 응답 생성
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SlaveStatus::Error,
            message: Some(message.into()),
            duration_ms: None,
            timestamp: Some(Utc::now()),
        }
    }
}

/// 구동 결과 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuationOutcome {
    /// 요청된 결정
    pub requested: Decision,
    /// 구동 완료 여부
    pub executed: bool,
    /// 구동 대상
    pub target: ActuationTarget,
    /// 원격 응답 (원격 구동 시)
    #[serde(default)]
    pub remote_status: Option<SlaveResponse>,
    /// 실패 사유
    #[serde(default)]
    pub error: Option<String>,
    /// 구동 소요 시간 (밀리초)
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ActuationOutcome {
    /// 성공 결과
    pub fn executed(
        requested: Decision,
        target: ActuationTarget,
        remote_status: Option<SlaveResponse>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            requested,
            executed: true,
            target,
            remote_status,
            error: None,
            elapsed_ms,
        }
    }

    /// 실패 결과
    pub fn failed(
        requested: Decision,
        target: ActuationTarget,
        error: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            requested,
            executed: false,
            target,
            remote_status: None,
            error: Some(error.into()),
            elapsed_ms,
        }
    }
}
