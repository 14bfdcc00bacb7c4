//! master → slave 원격 구동 통합 테스트.
//!
//! 실제 slave 서버(또는 응답하지 않는 스텁)를 띄우고 master 파이프라인을 실행한다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::post;
use axum::Router;
use leafguard_actuator::controller::SprayerController;
use leafguard_actuator::driver::SimulatedDriver;
use leafguard_core::config::BusyPolicy;
use leafguard_core::decision::DecisionPolicy;
use leafguard_core::error::CoreError;
use leafguard_core::models::actuation::{ActuationTarget, SlaveStatus};
use leafguard_core::models::capture::CaptureResult;
use leafguard_core::models::decision::SprayAction;
use leafguard_core::models::detection::{BackendKind, DetectionResult};
use leafguard_core::models::run::RunStatus;
use leafguard_core::ports::detection::DetectionBackend;
use leafguard_core::ports::run_log::RunLog;
use leafguard_network::slave_client::SlaveClient;
use leafguard_pipeline::PipelineOrchestrator;
use leafguard_storage::SqliteRunLog;
use leafguard_vision::capture::MockCamera;
use leafguard_web::{ServerConfig, SlaveState, WebServer};

/// 고정 라벨/심각도 판별기
struct FixedDetector {
    label: &'static str,
    severity: f64,
}

#[async_trait]
impl DetectionBackend for FixedDetector {
    async fn detect(&self, _capture: &CaptureResult) -> Result<DetectionResult, CoreError> {
        DetectionResult::new(
            self.label,
            self.severity,
            BackendKind::Mock,
            serde_json::Value::Null,
        )
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Mock
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// 시뮬레이션 드라이버 위의 실제 slave 서버
async fn spawn_slave() -> (String, Arc<SprayerController>) {
    let controller = Arc::new(SprayerController::new(
        Arc::new(SimulatedDriver::new(17)),
        BusyPolicy::Queue,
    ));
    let server = WebServer::slave(
        SlaveState::new(controller.clone(), 17, 10_000),
        ServerConfig {
            port: 0,
            allow_external: false,
            port_fallback: false,
        },
    );
    let addr = serve(server.router()).await;
    (format!("http://{addr}"), controller)
}

fn master(
    slave_url: &str,
    slave_timeout: Duration,
    severity: f64,
) -> (PipelineOrchestrator, Arc<SqliteRunLog>) {
    let client = SlaveClient::new(slave_url, slave_timeout, Duration::from_millis(20)).unwrap();
    let run_log = Arc::new(SqliteRunLog::open_in_memory().unwrap());
    let pipeline = PipelineOrchestrator::new(
        Arc::new(MockCamera::new(32, 24, None)),
        Arc::new(FixedDetector {
            label: if severity < 30.0 { "healthy" } else { "leaf_spot" },
            severity,
        }),
        DecisionPolicy::new(30.0, 70.0, 20, 40).unwrap(),
        Arc::new(SprayerController::new(Arc::new(client), BusyPolicy::Queue)),
        run_log.clone(),
    );
    (pipeline, run_log)
}

#[tokio::test]
async fn master_drives_slave_end_to_end() {
    let (slave_url, slave) = spawn_slave().await;
    let (pipeline, _) = master(&slave_url, Duration::from_secs(2), 85.0);
    assert_eq!(pipeline.actuation_target(), ActuationTarget::RemoteSlave);

    let record = pipeline.run_once().await.unwrap();
    assert_eq!(record.status, RunStatus::Success);
    assert_eq!(record.decision.action, SprayAction::On);
    assert_eq!(record.decision.duration_ms, 40);

    let outcome = record.actuation.as_ref().unwrap();
    assert!(outcome.executed);
    assert_eq!(outcome.target, ActuationTarget::RemoteSlave);
    let remote = outcome.remote_status.as_ref().unwrap();
    assert_eq!(remote.status, SlaveStatus::Success);
    assert_eq!(remote.duration_ms, Some(40));

    let stats = slave.stats();
    assert_eq!(stats.total_commands, 1);
    assert_eq!(stats.total_sprays, 1);
    assert_eq!(stats.total_duration_ms, 40);

    let summary = record.summary();
    assert_eq!(summary.result, "Diseased (High)");
    assert_eq!(summary.pi_response.unwrap().status, SlaveStatus::Success);
}

/// 건강 판정(off)도 slave에 전달되지만 분무는 일어나지 않는다
#[tokio::test]
async fn off_decision_is_forwarded_without_spraying() {
    let (slave_url, slave) = spawn_slave().await;
    let (pipeline, _) = master(&slave_url, Duration::from_secs(2), 10.0);

    let record = pipeline.run_once().await.unwrap();
    assert_eq!(record.decision.action, SprayAction::Off);
    assert_eq!(record.decision.duration_ms, 0);
    assert!(record.actuation.unwrap().executed);

    let stats = slave.stats();
    assert_eq!(stats.total_commands, 1);
    assert_eq!(stats.total_sprays, 0);
}

/// slave가 응답하지 않으면 구동 실패로 기록되지만 실행 자체는 성공으로 남는다
#[tokio::test]
async fn slave_timeout_is_recorded_as_failed_actuation() {
    let stub = Router::new().route(
        "/sprinkle",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let addr = serve(stub).await;
    let (pipeline, run_log) = master(&format!("http://{addr}"), Duration::from_millis(200), 85.0);

    let started = std::time::Instant::now();
    let record = pipeline.run_once().await.unwrap();
    // 타임아웃은 재시도하지 않는다
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(record.status, RunStatus::Success);
    assert!(record.detection.is_some());
    let outcome = record.actuation.as_ref().unwrap();
    assert!(!outcome.executed);
    assert!(outcome.remote_status.is_none());
    assert!(outcome.error.as_deref().unwrap().contains("시간 초과"));

    let logged = run_log.list_recent(1).await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0], record);
}

#[tokio::test]
async fn unreachable_slave_is_recorded_as_failed_actuation() {
    // 바인드 후 바로 닫아 연결이 거부되는 주소를 얻는다
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (pipeline, _) = master(&format!("http://{addr}"), Duration::from_millis(300), 85.0);

    let record = pipeline.run_once().await.unwrap();
    assert_eq!(record.status, RunStatus::Success);
    let outcome = record.actuation.unwrap();
    assert!(!outcome.executed);
    assert!(outcome.error.unwrap().contains("연결 실패"));
}
