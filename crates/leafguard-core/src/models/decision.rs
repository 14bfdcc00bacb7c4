//! 분무 결정 모델.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 분무 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SprayAction {
    On,
    Off,
}

impl SprayAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for SprayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 심각도 구간
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Healthy,
    Low,
    High,
}

impl SeverityTier {
    /// 사용자 표시용 결과 문자열
    pub fn result_label(&self) -> &'static str {
        match self {
            Self::Healthy => "Healthy",
            Self::Low => "Diseased (Low)",
            Self::High => "Diseased (High)",
        }
    }
}

/// 분무 결정
///
/// `action == Off`이면 `duration_ms == 0`. 생성자가 이를 보장한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// 분무 여부
    pub action: SprayAction,
    /// 분무 시간 (밀리초)
    pub duration_ms: u64,
    /// 심각도 구간
    pub tier: SeverityTier,
}

impl Decision {
    /// 분무하지 않음
    pub fn off() -> Self {
        Self {
            action: SprayAction::Off,
            duration_ms: 0,
            tier: SeverityTier::Healthy,
        }
    }

    /// 지정 시간 분무
    pub fn spray(duration_ms: u64, tier: SeverityTier) -> Self {
        Self {
            action: SprayAction::On,
            duration_ms,
            tier,
        }
    }

    /// 원격/수동 명령으로부터 결정 생성
    ///
    /// 구간 정보가 없으므로 on은 `High`로 둔다.
    pub fn command(action: SprayAction, duration_ms: u64) -> Self {
        match action {
            SprayAction::Off => Self::off(),
            SprayAction::On => Self::spray(duration_ms, SeverityTier::High),
        }
    }

    /// 실제 구동이 필요한지 여부
    pub fn requires_drive(&self) -> bool {
        self.action == SprayAction::On && self.duration_ms > 0
    }
}
