//! 분무기 컨트롤러.
//!
//! 물리 분무기의 유일한 소유자. 모든 구동 요청은 이 컨트롤러를 거치며
//! 비동기 뮤텍스로 직렬화되어 구동 신호 구간이 겹치지 않는다.
//! 사용 중일 때는 설정에 따라 대기(queue)하거나 즉시 "busy"로 거부(reject)한다.
//!
//! 상태: `idle → requested → {executed | failed} → idle`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leafguard_core::config::BusyPolicy;
use leafguard_core::error::CoreError;
use leafguard_core::models::actuation::{ActuationOutcome, ActuationTarget, SlaveResponse};
use leafguard_core::models::decision::Decision;
use leafguard_core::ports::actuator::{Actuator, SprayerDriver};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// 분무기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SprayerState {
    Idle,
    Requested,
    Executed,
    Failed,
}

/// 누적 구동 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SprayerStats {
    /// 처리한 전체 명령 수 (off 포함, busy 거부 제외)
    pub total_commands: u64,
    /// 실제 분무 횟수
    pub total_sprays: u64,
    /// 누적 분무 시간 (밀리초)
    pub total_duration_ms: u64,
    /// 실패 횟수
    pub failures: u64,
    /// busy 거부 횟수
    pub rejected_busy: u64,
    /// 마지막 명령 시각
    pub last_command_at: Option<DateTime<Utc>>,
    /// 마지막 명령 결과 (executed/failed)
    pub last_result: Option<SprayerState>,
}

impl SprayerStats {
    /// 평균 분무 시간 (밀리초)
    pub fn average_duration_ms(&self) -> f64 {
        if self.total_sprays == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.total_sprays as f64
        }
    }
}

#[derive(Debug)]
struct Snapshot {
    state: SprayerState,
    stats: SprayerStats,
}

/// 분무기 단일 소유 컨트롤러
pub struct SprayerController {
    driver: Arc<dyn SprayerDriver>,
    busy_policy: BusyPolicy,
    /// 구동 직렬화 잠금 (구동 태스크가 소유)
    gate: Arc<Mutex<()>>,
    snapshot: Arc<parking_lot::Mutex<Snapshot>>,
}

impl SprayerController {
    pub fn new(driver: Arc<dyn SprayerDriver>, busy_policy: BusyPolicy) -> Self {
        info!(
            "분무기 컨트롤러: driver={}, target={}, busy_policy={busy_policy:?}",
            driver.name(),
            driver.target()
        );
        Self {
            driver,
            busy_policy,
            gate: Arc::new(Mutex::new(())),
            snapshot: Arc::new(parking_lot::Mutex::new(Snapshot {
                state: SprayerState::Idle,
                stats: SprayerStats::default(),
            })),
        }
    }

    /// 결정 실행
    ///
    /// reject 정책에서 사용 중이면 `CoreError::SprayerBusy`.
    /// 구동은 별도 태스크에서 돌기 때문에 호출자가 취소되어도 끝까지 진행되고
    /// 핀은 비활성 레벨로 돌아간다.
    pub async fn execute(&self, decision: &Decision) -> Result<Option<SlaveResponse>, CoreError> {
        let guard = match self.busy_policy {
            BusyPolicy::Queue => self.gate.clone().lock_owned().await,
            BusyPolicy::Reject => match self.gate.clone().try_lock_owned() {
                Ok(guard) => guard,
                Err(_) => {
                    warn!("분무기 사용 중: 요청 거부");
                    self.snapshot.lock().stats.rejected_busy += 1;
                    return Err(CoreError::SprayerBusy);
                }
            },
        };

        self.snapshot.lock().state = SprayerState::Requested;

        let driver = self.driver.clone();
        let snapshot = self.snapshot.clone();
        let decision = *decision;
        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = driver.drive(&decision).await;
            record(&mut snapshot.lock(), &decision, &result);
            result
        });

        task.await
            .map_err(|e| CoreError::Internal(format!("분무기 구동 태스크 실패: {e}")))?
    }

    /// 현재 상태
    pub fn state(&self) -> SprayerState {
        self.snapshot.lock().state
    }

    /// 누적 통계
    pub fn stats(&self) -> SprayerStats {
        self.snapshot.lock().stats.clone()
    }

    /// 드라이버 이름
    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }
}

/// 구동 결과를 통계에 반영하고 idle로 복귀
fn record(
    snapshot: &mut Snapshot,
    decision: &Decision,
    result: &Result<Option<SlaveResponse>, CoreError>,
) {
    let stats = &mut snapshot.stats;
    stats.total_commands += 1;
    stats.last_command_at = Some(Utc::now());
    match result {
        Ok(_) => {
            if decision.requires_drive() {
                stats.total_sprays += 1;
                stats.total_duration_ms += decision.duration_ms;
            }
            stats.last_result = Some(SprayerState::Executed);
        }
        Err(e) => {
            warn!("분무기 구동 실패: {e}");
            stats.failures += 1;
            stats.last_result = Some(SprayerState::Failed);
        }
    }
    snapshot.state = SprayerState::Idle;
}

#[async_trait]
impl Actuator for SprayerController {
    async fn actuate(&self, decision: &Decision) -> ActuationOutcome {
        let started = Instant::now();
        let result = self.execute(decision).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let target = self.driver.target();

        match result {
            Ok(remote_status) => {
                ActuationOutcome::executed(*decision, target, remote_status, elapsed_ms)
            }
            Err(e) => ActuationOutcome::failed(*decision, target, e.to_string(), elapsed_ms),
        }
    }

    fn target(&self) -> ActuationTarget {
        self.driver.target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use leafguard_core::models::decision::SeverityTier;
    use std::time::Duration;

    /// 구동 구간을 기록하는 드라이버
    struct RecordingDriver {
        windows: parking_lot::Mutex<Vec<(Instant, Instant)>>,
        fail: bool,
    }

    impl RecordingDriver {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                windows: parking_lot::Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl SprayerDriver for RecordingDriver {
        async fn drive(&self, decision: &Decision) -> Result<Option<SlaveResponse>, CoreError> {
            let start = Instant::now();
            tokio::time::sleep(Duration::from_millis(decision.duration_ms)).await;
            self.windows.lock().push((start, Instant::now()));
            if self.fail {
                return Err(CoreError::Actuation("relay fault".to_string()));
            }
            Ok(None)
        }

        fn target(&self) -> ActuationTarget {
            ActuationTarget::LocalGpio
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn concurrent_requests_never_overlap() {
        let driver = RecordingDriver::new(false);
        let controller = Arc::new(SprayerController::new(driver.clone(), BusyPolicy::Queue));

        let tasks = (0..4).map(|_| {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .actuate(&Decision::spray(40, SeverityTier::Low))
                    .await
            })
        });
        for outcome in futures::future::join_all(tasks).await {
            assert!(outcome.unwrap().executed);
        }

        let mut windows = driver.windows.lock().clone();
        assert_eq!(windows.len(), 4);
        windows.sort_by_key(|w| w.0);
        for pair in windows.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "구동 구간 겹침");
        }

        let stats = controller.stats();
        assert_eq!(stats.total_commands, 4);
        assert_eq!(stats.total_sprays, 4);
        assert_eq!(stats.total_duration_ms, 160);
        assert_eq!(stats.average_duration_ms(), 40.0);
        assert_eq!(controller.state(), SprayerState::Idle);
    }

    #[tokio::test]
    async fn reject_policy_reports_busy() {
        let driver = RecordingDriver::new(false);
        let controller = Arc::new(SprayerController::new(driver, BusyPolicy::Reject));

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .actuate(&Decision::spray(150, SeverityTier::High))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(controller.state(), SprayerState::Requested);

        let second = controller
            .actuate(&Decision::spray(10, SeverityTier::Low))
            .await;
        assert!(!second.executed);
        assert_eq!(second.error.as_deref(), Some("sprayer busy"));

        assert!(first.await.unwrap().executed);
        assert_eq!(controller.stats().rejected_busy, 1);
        assert_matches!(
            controller.execute(&Decision::off()).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn driver_failure_becomes_outcome() {
        let controller = SprayerController::new(RecordingDriver::new(true), BusyPolicy::Queue);
        let outcome = controller
            .actuate(&Decision::spray(5, SeverityTier::Low))
            .await;

        assert!(!outcome.executed);
        assert_eq!(outcome.target, ActuationTarget::LocalGpio);
        assert!(outcome.error.unwrap().contains("relay fault"));

        let stats = controller.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.total_sprays, 0);
        assert_eq!(stats.last_result, Some(SprayerState::Failed));
    }

    #[tokio::test]
    async fn off_decision_counts_as_command_only() {
        let controller = SprayerController::new(RecordingDriver::new(false), BusyPolicy::Queue);
        let outcome = controller.actuate(&Decision::off()).await;
        assert!(outcome.executed);

        let stats = controller.stats();
        assert_eq!(stats.total_commands, 1);
        assert_eq!(stats.total_sprays, 0);
        assert_eq!(stats.last_result, Some(SprayerState::Executed));
    }

    #[tokio::test]
    async fn cancelled_caller_does_not_cut_drive_short() {
        let driver = RecordingDriver::new(false);
        let controller = Arc::new(SprayerController::new(driver.clone(), BusyPolicy::Queue));

        let caller = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .actuate(&Decision::spray(120, SeverityTier::High))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let windows = driver.windows.lock().clone();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].1 - windows[0].0 >= Duration::from_millis(120));

        let stats = controller.stats();
        assert_eq!(stats.total_sprays, 1);
        assert_eq!(controller.state(), SprayerState::Idle);
    }

    #[tokio::test]
    async fn cancelled_caller_leaves_gpio_inactive() {
        use crate::driver::sysfs::tests::{fake_sysfs, read};
        use crate::driver::SysfsGpioDriver;

        let root = tempfile::tempdir().unwrap();
        fake_sysfs(root.path(), 17);
        let driver = SysfsGpioDriver::open(root.path(), 17, false).await.unwrap();
        let controller = Arc::new(SprayerController::new(Arc::new(driver), BusyPolicy::Queue));

        let caller = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .execute(&Decision::spray(150, SeverityTier::High))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(read(root.path(), 17, "value"), "1");
        caller.abort();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(read(root.path(), 17, "value"), "0");
        assert_eq!(controller.state(), SprayerState::Idle);
        assert_eq!(controller.stats().total_commands, 1);
    }

    #[tokio::test]
    async fn queued_request_waits_for_cancelled_drive() {
        let driver = RecordingDriver::new(false);
        let controller = Arc::new(SprayerController::new(driver.clone(), BusyPolicy::Queue));

        let caller = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .execute(&Decision::spray(100, SeverityTier::High))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        caller.abort();

        controller
            .execute(&Decision::spray(10, SeverityTier::Low))
            .await
            .unwrap();
        let windows = driver.windows.lock().clone();
        assert_eq!(windows.len(), 2);
        assert!(windows[0].1 <= windows[1].0, "구동 구간 겹침");
    }
}
