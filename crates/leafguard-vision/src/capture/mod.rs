//! 캡처 소스.
//!
//! 설정의 `CAMERA_SOURCE`에 따라 프로세스당 하나의 구현체를 생성한다.
//! 하드웨어 카메라는 외부 CLI(`rpicam-still`, `ffmpeg`)로 정지 이미지를 받는다.

mod mock;
mod onboard;
mod usb;

pub use mock::MockCamera;
pub use onboard::OnboardCamera;
pub use usb::UsbCamera;

use leafguard_core::config::AppConfig;
use leafguard_core::error::CoreError;
use leafguard_core::models::capture::{CaptureResult, CaptureSource, ImageFormat};
use leafguard_core::ports::capture::CaptureProvider;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use crate::store::CaptureStore;

/// 설정에 맞는 캡처 소스 생성
pub fn create_capture_provider(
    config: &AppConfig,
    store: Option<Arc<CaptureStore>>,
) -> Arc<dyn CaptureProvider> {
    let (width, height) = (config.camera_width, config.camera_height);
    info!("캡처 소스: {} ({width}x{height})", config.camera_source);

    match config.camera_source {
        CaptureSource::OnboardCamera => Arc::new(OnboardCamera::new(width, height, store)),
        CaptureSource::UsbCamera => Arc::new(UsbCamera::new(
            config.camera_device.clone(),
            width,
            height,
            store,
        )),
        CaptureSource::Mock => Arc::new(MockCamera::new(width, height, store)),
    }
}

/// 외부 캡처 명령 실패 사유
#[derive(Debug)]
pub(crate) enum CommandFailure {
    /// 실행 파일 없음
    NotFound,
    /// 실행 실패 또는 비정상 종료
    Failed(String),
}

/// 캡처 명령 실행 후 stdout(이미지 바이트) 반환
pub(crate) async fn run_capture_command(
    program: &str,
    args: &[String],
) -> Result<Vec<u8>, CommandFailure> {
    debug!("캡처 명령 실행: {program} {}", args.join(" "));

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CommandFailure::NotFound,
            std::io::ErrorKind::PermissionDenied => {
                CommandFailure::Failed(format!("{program} 실행 권한 없음"))
            }
            _ => CommandFailure::Failed(format!("{program} 실행 실패: {e}")),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail: String = stderr.trim().chars().take(200).collect();
        return Err(CommandFailure::Failed(format!(
            "{program} 종료 코드 {:?}: {detail}",
            output.status.code()
        )));
    }

    if output.stdout.is_empty() {
        return Err(CommandFailure::Failed(format!("{program}: 빈 이미지")));
    }

    Ok(output.stdout)
}

/// 바이트 검증 후 저장하여 `CaptureResult` 생성
pub(crate) async fn finish_capture(
    source_kind: CaptureSource,
    image_bytes: Vec<u8>,
    store: Option<&CaptureStore>,
) -> Result<CaptureResult, CoreError> {
    let image_format = ImageFormat::sniff(&image_bytes).ok_or_else(|| {
        CoreError::Capture(format!("{source_kind}: 알 수 없는 이미지 포맷"))
    })?;
    let captured_at = chrono::Utc::now();

    let file_reference = match store {
        Some(store) => Some(store.save(captured_at, &image_bytes, image_format).await?),
        None => None,
    };

    Ok(CaptureResult {
        image_bytes,
        source_kind,
        captured_at,
        file_reference,
        image_format,
    })
}
