//! 애플리케이션 설정.
//!
//! 모든 필드는 기본값을 가지며, 선택적 설정 파일(JSON/TOML) 위에 프로세스
//! 환경변수(`CAMERA_SOURCE`, `DETECTION_BACKEND`, `SEVERITY_LOW_THRESHOLD` …)를
//! 덮어써서 `config` crate로 로드한다. 시작 시 [`AppConfig::validate`]를 통과해야 한다.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::decision::DecisionPolicy;
use crate::error::CoreError;
use crate::models::actuation::ActuationTarget;
use crate::models::capture::CaptureSource;
use crate::models::detection::BackendKind;

/// 주기 캡처 최소 간격 (초)
pub const MIN_CAPTURE_INTERVAL_SECS: u64 = 5;

/// BCM 핀 번호 상한
pub const MAX_GPIO_PIN: u32 = 40;

/// 프로세스 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 캡처·판별·결정을 수행하고 구동을 위임하거나 직접 구동
    Master,
    /// 분무기 하드웨어를 소유하고 `/sprinkle` 요청을 처리
    Slave,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Master => "master",
            Self::Slave => "slave",
        })
    }
}

/// 분무기가 사용 중일 때의 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// 앞선 구동이 끝날 때까지 대기
    Queue,
    /// 즉시 "busy"로 거부
    Reject,
}

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 프로세스 역할
    pub role: Role,

    // ── 캡처 ──
    /// 이미지 소스
    pub camera_source: CaptureSource,
    /// USB 카메라 장치 경로
    pub camera_device: String,
    /// 캡처 너비 (픽셀)
    pub camera_width: u32,
    /// 캡처 높이 (픽셀)
    pub camera_height: u32,
    /// 캡처 단계 타임아웃 (초)
    pub capture_timeout_secs: u64,

    // ── 판별 ──
    /// 판별 백엔드
    pub detection_backend: BackendKind,
    /// plant.id API 키
    pub plant_id_api_key: Option<String>,
    /// plant.id 건강 진단 엔드포인트
    pub plant_id_endpoint: String,
    /// Gemini API 키
    pub gemini_api_key: Option<String>,
    /// Gemini 모델명
    pub gemini_model: String,
    /// Gemini API 기본 URL
    pub gemini_endpoint: String,
    /// 판별 단계 타임아웃 (초)
    pub detection_timeout_secs: u64,

    // ── 판정 ──
    pub severity_low_threshold: f64,
    pub severity_high_threshold: f64,
    /// 음수 검출을 위해 부호 있는 정수로 받는다
    pub spray_duration_low_ms: i64,
    pub spray_duration_high_ms: i64,

    // ── 구동 ──
    /// 구동 대상 (master 전용, slave는 항상 local-gpio)
    pub actuation_target: ActuationTarget,
    /// 분무기 릴레이 BCM 핀
    pub gpio_pin_sprayer: u32,
    /// sysfs GPIO 루트
    pub gpio_sysfs_root: PathBuf,
    /// active-LOW 릴레이 여부
    pub gpio_active_low: bool,
    /// 사용 중 처리 방식
    pub busy_policy: BusyPolicy,
    /// 슬레이브가 허용하는 최대 분무 시간 (밀리초)
    pub max_spray_duration_ms: u64,
    /// 슬레이브 기본 URL (예: `http://192.168.0.20:5001`)
    pub slave_url: Option<String>,
    /// 슬레이브 응답 대기 시간 (초, 분무 시간 별도)
    pub slave_timeout_secs: u64,
    /// 연결 실패 시 재시도 전 대기 (밀리초)
    pub slave_retry_backoff_ms: u64,

    // ── 저장소 ──
    /// 데이터 디렉토리 (None이면 플랫폼 기본 경로)
    pub data_dir: Option<PathBuf>,
    /// SQLite 파일 경로 (None이면 `<data_dir>/leafguard.db`)
    pub database_path: Option<PathBuf>,
    /// 캡처 이미지 디렉토리 (None이면 `<data_dir>/captures`)
    pub image_dir: Option<PathBuf>,
    /// 캡처 이미지 보존 시간 (0이면 무기한)
    pub image_retention_hours: u64,

    // ── 스케줄/웹 ──
    /// 주기 캡처 간격 (0이면 비활성)
    pub capture_interval_secs: u64,
    /// HTTP 포트 (None이면 역할별 기본값)
    pub web_port: Option<u16>,
    /// 외부 접속 허용 (0.0.0.0 바인드)
    pub web_allow_external: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            role: Role::Master,
            camera_source: CaptureSource::Mock,
            camera_device: "/dev/video0".to_string(),
            camera_width: 640,
            camera_height: 480,
            capture_timeout_secs: 15,
            detection_backend: BackendKind::Mock,
            plant_id_api_key: None,
            plant_id_endpoint: default_plant_id_endpoint(),
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            gemini_endpoint: default_gemini_endpoint(),
            detection_timeout_secs: 15,
            severity_low_threshold: 30.0,
            severity_high_threshold: 70.0,
            spray_duration_low_ms: 2_000,
            spray_duration_high_ms: 5_000,
            actuation_target: ActuationTarget::LocalGpio,
            gpio_pin_sprayer: 17,
            gpio_sysfs_root: PathBuf::from("/sys/class/gpio"),
            gpio_active_low: false,
            busy_policy: BusyPolicy::Queue,
            max_spray_duration_ms: 60_000,
            slave_url: None,
            slave_timeout_secs: 10,
            slave_retry_backoff_ms: 500,
            data_dir: None,
            database_path: None,
            image_dir: None,
            image_retention_hours: 24,
            capture_interval_secs: 0,
            web_port: None,
            web_allow_external: true,
        }
    }
}

fn default_plant_id_endpoint() -> String {
    "https://plant.id/api/v3/health_assessment".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

/// 빈 문자열을 None으로 취급
fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// 설정 파일 + 프로세스 환경변수에서 로드
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        Self::load_from(path, None)
    }

    /// 설정 파일 + 지정된 환경변수 맵에서 로드 (테스트용)
    pub fn load_with_env(
        path: Option<&Path>,
        env: HashMap<String, String>,
    ) -> Result<Self, CoreError> {
        Self::load_from(path, Some(env))
    }

    fn load_from(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, CoreError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(CoreError::Config(format!(
                    "설정 파일 없음: {}",
                    path.display()
                )));
            }
            debug!("설정 파일 로드: {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }

        let environment = config::Environment::default().ignore_empty(true);
        let environment = match env {
            Some(map) => environment.source(Some(map.into_iter().collect())),
            None => environment,
        };

        builder
            .add_source(environment)
            .build()
            .and_then(|c| c.try_deserialize::<AppConfig>())
            .map_err(|e| CoreError::Config(format!("설정 로드 실패: {e}")))
    }

    /// 시작 시 검증. 실패는 치명적이다.
    pub fn validate(&self) -> Result<(), CoreError> {
        DecisionPolicy::from_config(self)?;

        for (name, value) in [
            ("SPRAY_DURATION_LOW_MS", self.spray_duration_low_ms),
            ("SPRAY_DURATION_HIGH_MS", self.spray_duration_high_ms),
        ] {
            if value as u64 > self.max_spray_duration_ms {
                return Err(CoreError::Config(format!(
                    "{name}({value})가 MAX_SPRAY_DURATION_MS({})를 초과",
                    self.max_spray_duration_ms
                )));
            }
        }

        for (name, value) in [
            ("CAPTURE_TIMEOUT_SECS", self.capture_timeout_secs),
            ("DETECTION_TIMEOUT_SECS", self.detection_timeout_secs),
            ("SLAVE_TIMEOUT_SECS", self.slave_timeout_secs),
        ] {
            if value == 0 {
                return Err(CoreError::Config(format!("{name}는 0보다 커야 함")));
            }
        }

        if self.gpio_pin_sprayer == 0 || self.gpio_pin_sprayer > MAX_GPIO_PIN {
            return Err(CoreError::Config(format!(
                "GPIO_PIN_SPRAYER는 1–{MAX_GPIO_PIN} 범위여야 함: {}",
                self.gpio_pin_sprayer
            )));
        }

        if self.capture_interval_secs != 0 && self.capture_interval_secs < MIN_CAPTURE_INTERVAL_SECS
        {
            return Err(CoreError::Config(format!(
                "CAPTURE_INTERVAL_SECS는 0(비활성) 또는 {MIN_CAPTURE_INTERVAL_SECS}초 이상이어야 함: {}",
                self.capture_interval_secs
            )));
        }

        if self.camera_width == 0 || self.camera_height == 0 {
            return Err(CoreError::Config("카메라 해상도는 0일 수 없음".to_string()));
        }

        if self.role == Role::Master {
            self.validate_credentials()?;

            if self.actuation_target == ActuationTarget::RemoteSlave {
                match self.slave_url() {
                    None => {
                        return Err(CoreError::Config(
                            "ACTUATION_TARGET=remote-slave 이지만 SLAVE_URL 미설정".to_string(),
                        ))
                    }
                    Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                        return Err(CoreError::Config(format!(
                            "SLAVE_URL은 http(s)로 시작해야 함: {url}"
                        )))
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }

    /// 선택된 백엔드의 자격증명 확인
    fn validate_credentials(&self) -> Result<(), CoreError> {
        match self.detection_backend {
            BackendKind::PlantId if non_empty(&self.plant_id_api_key).is_none() => Err(
                CoreError::Config("DETECTION_BACKEND=plantid 에는 PLANT_ID_API_KEY 필요".to_string()),
            ),
            BackendKind::Gemini if non_empty(&self.gemini_api_key).is_none() => Err(
                CoreError::Config("DETECTION_BACKEND=gemini 에는 GEMINI_API_KEY 필요".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// 슬레이브 URL (끝의 `/` 및 `/sprinkle` 제거)
    pub fn slave_url(&self) -> Option<&str> {
        non_empty(&self.slave_url).map(|url| {
            let url = url.trim_end_matches('/');
            url.strip_suffix("/sprinkle").unwrap_or(url)
        })
    }

    pub fn plant_id_api_key(&self) -> Option<&str> {
        non_empty(&self.plant_id_api_key)
    }

    pub fn gemini_api_key(&self) -> Option<&str> {
        non_empty(&self.gemini_api_key)
    }

    /// 실제 구동 대상. slave는 항상 로컬 GPIO
    pub fn effective_actuation_target(&self) -> ActuationTarget {
        match self.role {
            Role::Slave => ActuationTarget::LocalGpio,
            Role::Master => self.actuation_target,
        }
    }

    /// HTTP 포트 (master 5000, slave 5001)
    pub fn effective_web_port(&self) -> u16 {
        self.web_port.unwrap_or(match self.role {
            Role::Master => 5000,
            Role::Slave => 5001,
        })
    }

    /// 데이터 디렉토리 (미설정 시 `./data`)
    pub fn data_root(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("./data"))
    }

    /// SQLite 파일 경로
    pub fn database_file(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_root().join("leafguard.db"))
    }

    /// 캡처 이미지 디렉토리
    pub fn image_root(&self) -> PathBuf {
        self.image_dir
            .clone()
            .unwrap_or_else(|| self.data_root().join("captures"))
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_secs(self.detection_timeout_secs)
    }

    pub fn slave_timeout(&self) -> Duration {
        Duration::from_secs(self.slave_timeout_secs)
    }

    pub fn slave_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.slave_retry_backoff_ms)
    }

    /// 이미지 보존 기간 (0이면 None)
    pub fn image_retention(&self) -> Option<Duration> {
        (self.image_retention_hours > 0)
            .then(|| Duration::from_secs(self.image_retention_hours * 3600))
    }
}
