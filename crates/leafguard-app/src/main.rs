//! # leafguard
//!
//! LeafGuard 바이너리 진입점.
//! 설정 로드/검증, DI 와이어링, 스케줄러와 HTTP 서버 실행, 라이프사이클 관리.
//!
//! - master: 캡처 → 판별 → 판정 → 구동 → 기록 파이프라인 + `/api` 트리거 서버
//! - slave: 로컬 분무기를 소유하고 `/sprinkle` 요청을 처리

mod lifecycle;
mod scheduler;
mod wiring;

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use leafguard_core::config::{AppConfig, Role};
use leafguard_web::{MasterState, ServerConfig, WebServer};
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;
use crate::scheduler::{Scheduler, SchedulerConfig};

/// 실행 역할
#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Master,
    Slave,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Master => Role::Master,
            RoleArg::Slave => Role::Slave,
        }
    }
}

/// LeafGuard 식물 병해 감지/방제 에이전트
#[derive(Parser, Debug)]
#[command(name = "leafguard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 실행 역할 (기본: 설정의 ROLE, 없으면 master)
    #[arg(long, short = 'r', value_enum)]
    role: Option<RoleArg>,

    /// 설정 파일 (JSON/TOML). 환경변수가 파일 값을 덮어쓴다
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 데이터 저장 경로 (DB + 캡처 이미지)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 파이프라인 1회 실행 후 JSON 요약 출력 (master 전용)
    #[arg(long)]
    once: bool,
}

/// 데이터 경로 결정 (CLI 인자 → 설정 → 플랫폼 기본 경로)
///
/// - Linux: `~/.local/share/leafguard/`
/// - macOS: `~/Library/Application Support/org.leafguard.leafguard/`
fn resolve_data_dir(cli: Option<&Path>, configured: Option<&Path>) -> PathBuf {
    cli.or(configured)
        .map(Path::to_path_buf)
        .or_else(|| {
            ProjectDirs::from("org", "leafguard", "leafguard").map(|p| p.data_dir().to_path_buf())
        })
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn log_filter(level: &str) -> String {
    [
        "leafguard",
        "leafguard_core",
        "leafguard_vision",
        "leafguard_network",
        "leafguard_actuator",
        "leafguard_storage",
        "leafguard_pipeline",
        "leafguard_web",
        "tower_http",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(&args.log_level))),
        )
        .init();

    // 설정 로드 + 검증 (실패 시 시작 중단)
    let mut config = AppConfig::load(args.config.as_deref())
        .map_err(|e| anyhow!("설정 로드 실패: {e}"))?;
    if let Some(role) = args.role {
        config.role = role.into();
    }
    config.data_dir = Some(resolve_data_dir(
        args.data_dir.as_deref(),
        config.data_dir.as_deref(),
    ));
    config
        .validate()
        .map_err(|e| anyhow!("설정 검증 실패: {e}"))?;

    info!(
        "LeafGuard v{} 시작 (role={:?}, data={})",
        env!("CARGO_PKG_VERSION"),
        config.role,
        config.data_root().display()
    );

    match config.role {
        Role::Master => run_master(&config, args.once).await,
        Role::Slave => {
            if args.once {
                warn!("--once는 master 전용 옵션, 무시함");
            }
            run_slave(&config).await
        }
    }
}

async fn run_master(config: &AppConfig, once: bool) -> Result<()> {
    let master = wiring::build_master(config)
        .await
        .map_err(|e| anyhow!("master 초기화 실패: {e}"))?;

    if once {
        let record = master
            .pipeline
            .run_once()
            .await
            .map_err(|e| anyhow!("실행 기록 저장 실패: {e}"))?;
        println!("{}", serde_json::to_string_pretty(&record.summary())?);
        return Ok(());
    }

    let lifecycle = LifecycleManager::new();

    let scheduler = Scheduler::new(
        SchedulerConfig::from_app_config(config),
        master.pipeline.clone(),
        Some(master.store.clone()),
    );
    let scheduler_rx = lifecycle.subscribe();
    let scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_rx).await });

    let server = WebServer::master(
        MasterState {
            pipeline: master.pipeline.clone(),
            slave: master.slave.clone(),
        },
        ServerConfig::from_app_config(config),
        Some(config.image_root()),
    );
    let web_handle = tokio::spawn(server.run(lifecycle.subscribe()));

    let result = serve_until_shutdown(&lifecycle, web_handle).await;
    if let Err(e) = scheduler_handle.await {
        error!("스케줄러 종료 실패: {e}");
    }
    info!("LeafGuard master 종료");
    result
}

async fn run_slave(config: &AppConfig) -> Result<()> {
    let state = wiring::build_slave(config).await;
    let lifecycle = LifecycleManager::new();

    let server = WebServer::slave(state, ServerConfig::from_app_config(config));
    let web_handle = tokio::spawn(server.run(lifecycle.subscribe()));

    let result = serve_until_shutdown(&lifecycle, web_handle).await;
    info!("LeafGuard slave 종료");
    result
}

/// 시그널 또는 서버 조기 종료까지 대기
async fn serve_until_shutdown(
    lifecycle: &LifecycleManager,
    mut web_handle: JoinHandle<std::io::Result<()>>,
) -> Result<()> {
    tokio::select! {
        signal = lifecycle.wait_for_signal() => {
            if let Err(e) = signal {
                error!("시그널 핸들러 등록 실패: {e}");
            }
        }
        joined = &mut web_handle => {
            // 서버가 먼저 끝났다면 바인드 실패 등 비정상 종료
            lifecycle.shutdown();
            return flatten_server_result(joined);
        }
    }

    flatten_server_result(web_handle.await)
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(anyhow!("HTTP 서버 실패: {e}")),
        Err(e) => Err(anyhow!("HTTP 서버 태스크 실패: {e}")),
    }
}
