//! 분무 판정 엔진.
//!
//! 심각도와 두 임계값으로 분무 여부와 시간을 결정하는 순수 함수.
//! 임계값 검증은 생성 시점(시작 시)에만 수행한다.
//!
//! | 구간 | 결정 |
//! |------|------|
//! | `s < low` | off, 0ms |
//! | `low ≤ s < high` | on, `low_duration_ms` |
//! | `s ≥ high` | on, `high_duration_ms` |

use crate::config::AppConfig;
use crate::error::CoreError;
use crate::models::decision::{Decision, SeverityTier};
use crate::models::detection::{DetectionResult, SEVERITY_MAX, SEVERITY_MIN};

/// 검증된 판정 정책
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    low_threshold: f64,
    high_threshold: f64,
    low_duration_ms: u64,
    high_duration_ms: u64,
}

impl DecisionPolicy {
    /// 정책 생성
    ///
    /// `low ≥ high`, 범위 밖 임계값, 음수 시간은 `CoreError::Config`.
    pub fn new(
        low_threshold: f64,
        high_threshold: f64,
        low_duration_ms: i64,
        high_duration_ms: i64,
    ) -> Result<Self, CoreError> {
        for (name, value) in [
            ("SEVERITY_LOW_THRESHOLD", low_threshold),
            ("SEVERITY_HIGH_THRESHOLD", high_threshold),
        ] {
            if !value.is_finite() || !(SEVERITY_MIN..=SEVERITY_MAX).contains(&value) {
                return Err(CoreError::Config(format!(
                    "{name}는 0–100 범위여야 함: {value}"
                )));
            }
        }
        if low_threshold >= high_threshold {
            return Err(CoreError::Config(format!(
                "SEVERITY_LOW_THRESHOLD({low_threshold})는 SEVERITY_HIGH_THRESHOLD({high_threshold})보다 작아야 함"
            )));
        }

        let low_duration_ms = non_negative("SPRAY_DURATION_LOW_MS", low_duration_ms)?;
        let high_duration_ms = non_negative("SPRAY_DURATION_HIGH_MS", high_duration_ms)?;

        Ok(Self {
            low_threshold,
            high_threshold,
            low_duration_ms,
            high_duration_ms,
        })
    }

    /// 설정에서 정책 생성
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        Self::new(
            config.severity_low_threshold,
            config.severity_high_threshold,
            config.spray_duration_low_ms,
            config.spray_duration_high_ms,
        )
    }

    /// 판별 결과로 결정
    pub fn decide(&self, detection: &DetectionResult) -> Decision {
        self.decide_severity(detection.severity)
    }

    /// 심각도로 결정 (하한 포함 반개구간)
    pub fn decide_severity(&self, severity: f64) -> Decision {
        if severity >= self.high_threshold {
            Decision::spray(self.high_duration_ms, SeverityTier::High)
        } else if severity >= self.low_threshold {
            Decision::spray(self.low_duration_ms, SeverityTier::Low)
        } else {
            Decision::off()
        }
    }

    pub fn low_threshold(&self) -> f64 {
        self.low_threshold
    }

    pub fn high_threshold(&self) -> f64 {
        self.high_threshold
    }
}

fn non_negative(name: &str, value: i64) -> Result<u64, CoreError> {
    u64::try_from(value)
        .map_err(|_| CoreError::Config(format!("{name}는 음수일 수 없음: {value}")))
}
