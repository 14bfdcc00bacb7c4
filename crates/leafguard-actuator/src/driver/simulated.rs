//! 시뮬레이션 분무기 드라이버.
//!
//! GPIO가 없는 호스트(개발 PC, CI)에서 사용한다. 실패하지 않는다.

use async_trait::async_trait;
use leafguard_core::error::CoreError;
use leafguard_core::models::actuation::{ActuationTarget, SlaveResponse};
use leafguard_core::models::decision::Decision;
use leafguard_core::ports::actuator::SprayerDriver;
use std::time::Duration;
use tracing::info;

/// 로그만 남기고 분무 시간만큼 대기하는 드라이버
pub struct SimulatedDriver {
    pin: u32,
}

impl SimulatedDriver {
    pub fn new(pin: u32) -> Self {
        Self { pin }
    }
}

#[async_trait]
impl SprayerDriver for SimulatedDriver {
    async fn drive(&self, decision: &Decision) -> Result<Option<SlaveResponse>, CoreError> {
        if !decision.requires_drive() {
            info!(pin = self.pin, "[시뮬레이션] 분무기 OFF 유지");
            return Ok(None);
        }

        info!(
            pin = self.pin,
            duration_ms = decision.duration_ms,
            "[시뮬레이션] 분무기 ON"
        );
        tokio::time::sleep(Duration::from_millis(decision.duration_ms)).await;
        info!(pin = self.pin, "[시뮬레이션] 분무기 OFF");
        Ok(None)
    }

    fn target(&self) -> ActuationTarget {
        ActuationTarget::LocalGpio
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leafguard_core::models::decision::SeverityTier;
    use std::time::Instant;

    #[tokio::test]
    async fn sleeps_for_requested_duration() {
        let driver = SimulatedDriver::new(17);
        let started = Instant::now();
        driver
            .drive(&Decision::spray(60, SeverityTier::Low))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn off_returns_immediately() {
        let driver = SimulatedDriver::new(17);
        let started = Instant::now();
        assert!(driver.drive(&Decision::off()).await.unwrap().is_none());
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(driver.target(), ActuationTarget::LocalGpio);
    }
}
