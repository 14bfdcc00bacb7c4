//! DI 와이어링.
//!
//! 설정값에 따라 포트 구현체를 한 번만 선택해 조립한다.
//! 이후 파이프라인은 어떤 구현체가 쓰이는지 알지 못한다.

use std::sync::Arc;

use leafguard_actuator::controller::SprayerController;
use leafguard_actuator::driver::create_local_driver;
use leafguard_core::config::AppConfig;
use leafguard_core::decision::DecisionPolicy;
use leafguard_core::error::CoreError;
use leafguard_core::models::actuation::ActuationTarget;
use leafguard_core::models::detection::BackendKind;
use leafguard_core::ports::actuator::SprayerDriver;
use leafguard_core::ports::detection::DetectionBackend;
use leafguard_network::gemini::GeminiClient;
use leafguard_network::plant_id::PlantIdClient;
use leafguard_network::slave_client::SlaveClient;
use leafguard_pipeline::{PipelineOrchestrator, StageTimeouts};
use leafguard_storage::SqliteRunLog;
use leafguard_vision::capture::create_capture_provider;
use leafguard_vision::detector::{MockDetector, TfliteDetector};
use leafguard_vision::store::CaptureStore;
use leafguard_web::SlaveState;
use tracing::{info, warn};

/// master 구성 요소
pub struct MasterRuntime {
    pub pipeline: Arc<PipelineOrchestrator>,
    pub slave: Option<Arc<SlaveClient>>,
    pub store: Arc<CaptureStore>,
}

/// 판별 백엔드 생성
pub fn create_detection_backend(
    config: &AppConfig,
) -> Result<Arc<dyn DetectionBackend>, CoreError> {
    let backend: Arc<dyn DetectionBackend> = match config.detection_backend {
        BackendKind::Mock => Arc::new(MockDetector::new()),
        BackendKind::PlantId => {
            let api_key = config
                .plant_id_api_key()
                .ok_or_else(|| CoreError::Config("PLANT_ID_API_KEY 미설정".to_string()))?;
            Arc::new(PlantIdClient::new(
                &config.plant_id_endpoint,
                api_key,
                config.detection_timeout(),
            )?)
        }
        BackendKind::Gemini => {
            let api_key = config
                .gemini_api_key()
                .ok_or_else(|| CoreError::Config("GEMINI_API_KEY 미설정".to_string()))?;
            Arc::new(GeminiClient::new(
                &config.gemini_endpoint,
                &config.gemini_model,
                api_key,
                config.detection_timeout(),
            )?)
        }
        BackendKind::Tflite => {
            warn!("온디바이스 모델 미구현: 모든 판별이 실패로 기록됨");
            Arc::new(TfliteDetector::new())
        }
    };

    info!(
        backend = backend.backend_kind().as_str(),
        external = backend.is_external(),
        "판별 백엔드 선택"
    );
    Ok(backend)
}

/// 분무기 컨트롤러 생성 (master)
///
/// `SLAVE_URL`이 설정되어 있으면 구동 대상과 무관하게 연결 확인용 클라이언트도 반환한다.
pub async fn create_actuator(
    config: &AppConfig,
) -> Result<(Arc<SprayerController>, Option<Arc<SlaveClient>>), CoreError> {
    let slave = match config.slave_url() {
        Some(url) => Some(Arc::new(SlaveClient::new(
            url,
            config.slave_timeout(),
            config.slave_retry_backoff(),
        )?)),
        None => None,
    };

    let driver: Arc<dyn SprayerDriver> = match (config.effective_actuation_target(), &slave) {
        (ActuationTarget::RemoteSlave, Some(client)) => client.clone(),
        (ActuationTarget::RemoteSlave, None) => {
            return Err(CoreError::Config(
                "ACTUATION_TARGET=remote-slave 이지만 SLAVE_URL 미설정".to_string(),
            ))
        }
        (ActuationTarget::LocalGpio, _) => create_local_driver(config).await,
    };

    let controller = Arc::new(SprayerController::new(driver, config.busy_policy));
    Ok((controller, slave))
}

/// master 조립
pub async fn build_master(config: &AppConfig) -> Result<MasterRuntime, CoreError> {
    let store = Arc::new(CaptureStore::new(config.image_root()).await?);
    let capture = create_capture_provider(config, Some(store.clone()));
    let detector = create_detection_backend(config)?;
    let policy = DecisionPolicy::from_config(config)?;
    let (actuator, slave) = create_actuator(config).await?;
    let run_log = Arc::new(SqliteRunLog::open(&config.database_file())?);

    let pipeline = PipelineOrchestrator::new(capture, detector, policy, actuator, run_log)
        .with_timeouts(StageTimeouts::from_config(config));

    info!(
        camera = pipeline.source_kind().as_str(),
        backend = pipeline.backend_kind().as_str(),
        target = pipeline.actuation_target().as_str(),
        database = %config.database_file().display(),
        "master 구성 완료"
    );

    Ok(MasterRuntime {
        pipeline: Arc::new(pipeline),
        slave,
        store,
    })
}

/// slave 조립
pub async fn build_slave(config: &AppConfig) -> SlaveState {
    let driver = create_local_driver(config).await;
    let controller = Arc::new(SprayerController::new(driver, config.busy_policy));
    info!(
        pin = config.gpio_pin_sprayer,
        driver = controller.driver_name(),
        "slave 구성 완료"
    );

    SlaveState::new(
        controller,
        config.gpio_pin_sprayer,
        config.max_spray_duration_ms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use leafguard_core::config::Role;
    use leafguard_core::models::capture::CaptureSource;
    use leafguard_core::models::run::RunStatus;
    use leafguard_core::ports::run_log::RunLog;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            data_dir: Some(dir.to_path_buf()),
            // 테스트 호스트에는 GPIO가 없으므로 시뮬레이션으로 폴백
            gpio_sysfs_root: dir.join("no-gpio"),
            spray_duration_low_ms: 10,
            spray_duration_high_ms: 20,
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn mock_master_runs_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let master = build_master(&config).await.unwrap();
        assert!(master.slave.is_none());
        assert_eq!(master.pipeline.source_kind(), CaptureSource::Mock);

        let record = master.pipeline.run_once().await.unwrap();
        assert_eq!(record.status, RunStatus::Success);

        let file = record.capture.unwrap().file_reference.unwrap();
        assert!(master.store.root().join(&file).exists());
        assert!(config.database_file().exists());
        assert_eq!(master.pipeline.run_log().count().await.unwrap(), 1);
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        for backend in [BackendKind::PlantId, BackendKind::Gemini] {
            let config = AppConfig {
                detection_backend: backend,
                ..AppConfig::default()
            };
            let err = create_detection_backend(&config).err().unwrap();
            assert_matches!(err, CoreError::Config(_));
        }
    }

    #[test]
    fn external_backends_are_selected_by_config() {
        let config = AppConfig {
            detection_backend: BackendKind::Gemini,
            gemini_api_key: Some("key".to_string()),
            ..AppConfig::default()
        };
        let backend = create_detection_backend(&config).unwrap();
        assert_eq!(backend.backend_kind(), BackendKind::Gemini);
        assert!(backend.is_external());

        let config = AppConfig {
            detection_backend: BackendKind::Tflite,
            ..AppConfig::default()
        };
        let backend = create_detection_backend(&config).unwrap();
        assert_eq!(backend.backend_kind(), BackendKind::Tflite);
    }

    #[tokio::test]
    async fn remote_target_requires_slave_url() {
        let config = AppConfig {
            actuation_target: ActuationTarget::RemoteSlave,
            ..AppConfig::default()
        };
        let err = create_actuator(&config).await.err().unwrap();
        assert_matches!(err, CoreError::Config(_));
    }

    #[tokio::test]
    async fn remote_target_uses_slave_client() {
        let config = AppConfig {
            actuation_target: ActuationTarget::RemoteSlave,
            slave_url: Some("http://192.168.0.20:5001/sprinkle".to_string()),
            ..AppConfig::default()
        };
        let (controller, slave) = create_actuator(&config).await.unwrap();
        assert_eq!(controller.driver_name(), "remote-slave");
        assert_eq!(slave.unwrap().base_url(), "http://192.168.0.20:5001");
    }

    #[tokio::test]
    async fn slave_role_always_drives_locally() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            role: Role::Slave,
            actuation_target: ActuationTarget::RemoteSlave,
            ..config_in(dir.path())
        };
        let state = build_slave(&config).await;
        assert_eq!(state.controller.driver_name(), "simulated");
        assert_eq!(state.gpio_pin, 17);
        assert_eq!(state.max_spray_duration_ms, 60_000);
    }
}
