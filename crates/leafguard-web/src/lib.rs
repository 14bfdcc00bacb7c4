//! # leafguard-web
//!
//! Axum 기반 HTTP 서버.
//!
//! - master: `/api/capture_and_detect`, `/api/results`, `/api/health`,
//!   `/api/test_slave_connection`, 캡처 이미지 정적 서빙(`/images`)
//! - slave: `/sprinkle`, `/health`, `/status`, `/stats`, `/test`

pub mod error;
pub mod handlers;
pub mod routes;

use axum::Router;
use leafguard_actuator::controller::SprayerController;
use leafguard_core::config::{AppConfig, Role};
use leafguard_network::slave_client::SlaveClient;
use leafguard_pipeline::PipelineOrchestrator;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// 포트 충돌 시 최대 시도 횟수 (master만)
const MAX_PORT_ATTEMPTS: u16 = 10;

/// master 서버 상태
#[derive(Clone)]
pub struct MasterState {
    pub pipeline: Arc<PipelineOrchestrator>,
    /// 원격 구동 대상 (설정된 경우)
    pub slave: Option<Arc<SlaveClient>>,
}

/// slave 서버 상태
#[derive(Clone)]
pub struct SlaveState {
    pub controller: Arc<SprayerController>,
    pub gpio_pin: u32,
    pub max_spray_duration_ms: u64,
    /// `/status` 가동 시간 기준
    pub started_at: Instant,
}

impl SlaveState {
    pub fn new(controller: Arc<SprayerController>, gpio_pin: u32, max_spray_duration_ms: u64) -> Self {
        Self {
            controller,
            gpio_pin,
            max_spray_duration_ms,
            started_at: Instant::now(),
        }
    }
}

/// 바인드 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub allow_external: bool,
    /// 포트 사용 중일 때 다음 포트 시도 여부
    pub port_fallback: bool,
}

impl ServerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            port: config.effective_web_port(),
            allow_external: config.web_allow_external,
            // master가 slave 주소를 고정으로 알고 있으므로 slave는 포트를 바꾸지 않는다
            port_fallback: config.role == Role::Master,
        }
    }

    fn max_attempts(&self) -> u16 {
        if self.port_fallback {
            MAX_PORT_ATTEMPTS
        } else {
            1
        }
    }
}

/// HTTP 서버
pub struct WebServer {
    config: ServerConfig,
    router: Router,
}

impl WebServer {
    /// master 서버 구성
    pub fn master(state: MasterState, config: ServerConfig, image_dir: Option<PathBuf>) -> Self {
        let mut router = Router::new().nest("/api", routes::master_routes());
        if let Some(dir) = image_dir {
            router = router.nest_service("/images", ServeDir::new(dir));
        }
        Self {
            config,
            router: with_layers(router.with_state(state)),
        }
    }

    /// slave 서버 구성
    pub fn slave(state: SlaveState, config: ServerConfig) -> Self {
        Self {
            config,
            router: with_layers(routes::slave_routes().with_state(state)),
        }
    }

    /// 구성된 라우터 (테스트에서 임의 리스너에 직접 연결할 때 사용)
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.config.port)
    }

    /// 서버 실행 (종료 신호까지 블록)
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let host = if self.config.allow_external {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };

        let base_port = self.config.port;
        let mut last_error = None;

        for attempt in 0..self.config.max_attempts() {
            let port = base_port.saturating_add(attempt);

            if port < base_port && attempt > 0 {
                break;
            }

            let addr: SocketAddr = match format!("{host}:{port}").parse() {
                Ok(a) => a,
                Err(e) => {
                    error!("잘못된 주소 {host}:{port}: {e}");
                    continue;
                }
            };

            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    if attempt > 0 {
                        warn!("포트 {base_port} 사용 불가, 대체 포트 {port} 사용");
                    }
                    let local = listener.local_addr().unwrap_or(addr);
                    info!("HTTP 서버 시작: http://{local}");

                    axum::serve(listener, self.router)
                        .with_graceful_shutdown(async move {
                            loop {
                                if *shutdown_rx.borrow() {
                                    info!("HTTP 서버 종료 신호 수신");
                                    break;
                                }
                                if shutdown_rx.changed().await.is_err() {
                                    break;
                                }
                            }
                        })
                        .await?;

                    info!("HTTP 서버 종료");
                    return Ok(());
                }
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::AddrInUse {
                        warn!("포트 {port} 이미 사용 중");
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!(
                    "포트 {}-{} 모두 사용 불가",
                    base_port,
                    base_port.saturating_add(self.config.max_attempts() - 1)
                ),
            )
        }))
    }
}

fn with_layers(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use leafguard_actuator::driver::SimulatedDriver;
    use leafguard_core::config::BusyPolicy;

    fn slave_state() -> SlaveState {
        SlaveState::new(
            Arc::new(SprayerController::new(
                Arc::new(SimulatedDriver::new(17)),
                BusyPolicy::Queue,
            )),
            17,
            60_000,
        )
    }

    #[test]
    fn server_config_per_role() {
        let master = ServerConfig::from_app_config(&AppConfig::default());
        assert_eq!(master.port, 5000);
        assert!(master.port_fallback);
        assert_eq!(master.max_attempts(), MAX_PORT_ATTEMPTS);

        let slave = ServerConfig::from_app_config(&AppConfig {
            role: Role::Slave,
            ..AppConfig::default()
        });
        assert_eq!(slave.port, 5001);
        assert!(!slave.port_fallback);
        assert_eq!(slave.max_attempts(), 1);
    }

    #[test]
    fn web_server_url() {
        let server = WebServer::slave(
            slave_state(),
            ServerConfig {
                port: 5001,
                allow_external: false,
                port_fallback: false,
            },
        );
        assert_eq!(server.url(), "http://localhost:5001");
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let server = WebServer::slave(
            slave_state(),
            ServerConfig {
                port: 0,
                allow_external: false,
                port_fallback: false,
            },
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(server.run(rx));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("서버가 종료되어야 함")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn slave_port_in_use_is_an_error() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let server = WebServer::slave(
            slave_state(),
            ServerConfig {
                port,
                allow_external: false,
                port_fallback: false,
            },
        );
        let (_tx, rx) = watch::channel(false);
        let err = server.run(rx).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
    }
}
