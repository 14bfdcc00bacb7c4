//! 주기 실행 스케줄러.
//!
//! - 캡처 루프: `CAPTURE_INTERVAL_SECS`마다 `run_once` (0이면 비활성)
//! - 유지보수 루프: 1시간마다 캡처 이미지 보존 정책 적용
//!
//! 실행 중에 도래한 틱은 건너뛴다. 종료 신호를 받아도 진행 중인 실행은 끝까지 마친다.

use std::sync::Arc;
use std::time::Duration;

use leafguard_core::config::AppConfig;
use leafguard_pipeline::PipelineOrchestrator;
use leafguard_vision::store::CaptureStore;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 주기 캡처 간격 (None이면 비활성)
    pub capture_interval: Option<Duration>,
    /// 유지보수 간격
    pub maintenance_interval: Duration,
    /// 이미지 보존 기간 (None이면 무기한)
    pub image_retention: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capture_interval: None,
            maintenance_interval: Duration::from_secs(3600), // 1시간
            image_retention: Some(Duration::from_secs(24 * 3600)),
        }
    }
}

impl SchedulerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            capture_interval: (config.capture_interval_secs > 0)
                .then(|| Duration::from_secs(config.capture_interval_secs)),
            image_retention: config.image_retention(),
            ..Self::default()
        }
    }
}

/// 주기 실행 스케줄러
pub struct Scheduler {
    config: SchedulerConfig,
    pipeline: Arc<PipelineOrchestrator>,
    store: Option<Arc<CaptureStore>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        pipeline: Arc<PipelineOrchestrator>,
        store: Option<Arc<CaptureStore>>,
    ) -> Self {
        Self {
            config,
            pipeline,
            store,
        }
    }

    /// 종료 신호까지 실행
    pub async fn run(&self, shutdown_rx: watch::Receiver<bool>) {
        let mut handles = Vec::new();

        match self.config.capture_interval {
            Some(period) => {
                info!("주기 캡처 활성화: {}초", period.as_secs_f64());
                handles.push(tokio::spawn(capture_loop(
                    self.pipeline.clone(),
                    period,
                    shutdown_rx.clone(),
                )));
            }
            None => info!("주기 캡처 비활성 (요청 시에만 실행)"),
        }

        if let (Some(store), Some(max_age)) = (&self.store, self.config.image_retention) {
            handles.push(tokio::spawn(maintenance_loop(
                store.clone(),
                self.config.maintenance_interval,
                max_age,
                shutdown_rx.clone(),
            )));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("스케줄러 태스크 비정상 종료: {e}");
            }
        }
        info!("스케줄러 종료");
    }
}

async fn capture_loop(
    pipeline: Arc<PipelineOrchestrator>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match pipeline.run_once().await {
                    Ok(record) => debug!(
                        id = ?record.id,
                        status = ?record.status,
                        "주기 실행 완료"
                    ),
                    Err(e) => error!("주기 실행 기록 실패: {e}"),
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("캡처 루프 종료");
                    break;
                }
            }
        }
    }
}

async fn maintenance_loop(
    store: Arc<CaptureStore>,
    period: Duration,
    max_age: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match store.enforce_retention(max_age).await {
                    Ok(0) => {}
                    Ok(removed) => info!("보존 기간 지난 캡처 {removed}개 삭제"),
                    Err(e) => warn!("캡처 보존 정책 적용 실패: {e}"),
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("유지보수 루프 종료");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leafguard_actuator::controller::SprayerController;
    use leafguard_actuator::driver::SimulatedDriver;
    use leafguard_core::config::BusyPolicy;
    use leafguard_core::decision::DecisionPolicy;
    use leafguard_core::models::capture::ImageFormat;
    use leafguard_storage::SqliteRunLog;
    use leafguard_vision::capture::MockCamera;
    use leafguard_vision::detector::MockDetector;

    fn pipeline() -> Arc<PipelineOrchestrator> {
        Arc::new(PipelineOrchestrator::new(
            Arc::new(MockCamera::new(32, 24, None)),
            Arc::new(MockDetector::new()),
            DecisionPolicy::new(30.0, 70.0, 5, 10).unwrap(),
            Arc::new(SprayerController::new(
                Arc::new(SimulatedDriver::new(17)),
                BusyPolicy::Queue,
            )),
            Arc::new(SqliteRunLog::open_in_memory().unwrap()),
        ))
    }

    #[test]
    fn config_from_app_config() {
        let config = SchedulerConfig::from_app_config(&AppConfig::default());
        assert!(config.capture_interval.is_none());
        assert_eq!(config.image_retention, Some(Duration::from_secs(24 * 3600)));

        let config = SchedulerConfig::from_app_config(&AppConfig {
            capture_interval_secs: 30,
            image_retention_hours: 0,
            ..AppConfig::default()
        });
        assert_eq!(config.capture_interval, Some(Duration::from_secs(30)));
        assert!(config.image_retention.is_none());
    }

    #[tokio::test]
    async fn capture_loop_runs_until_shutdown() {
        let pipeline = pipeline();
        let scheduler = Scheduler::new(
            SchedulerConfig {
                capture_interval: Some(Duration::from_millis(40)),
                image_retention: None,
                ..SchedulerConfig::default()
            },
            pipeline.clone(),
            None,
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { scheduler.run(rx).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let runs = pipeline.run_log().count().await.unwrap();
        assert!(runs >= 2, "최소 2회 실행되어야 함: {runs}");
    }

    #[tokio::test]
    async fn maintenance_removes_expired_captures() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CaptureStore::new(dir.path().to_path_buf()).await.unwrap());
        let file = store
            .save(Utc::now(), &[0xFF, 0xD8, 0xFF, 0xD9], ImageFormat::Jpeg)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let scheduler = Scheduler::new(
            SchedulerConfig {
                capture_interval: None,
                maintenance_interval: Duration::from_millis(20),
                image_retention: Some(Duration::from_millis(1)),
            },
            pipeline(),
            Some(store.clone()),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { scheduler.run(rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(!store.root().join(file).exists());
    }
}
