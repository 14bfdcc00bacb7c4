//! USB(V4L2) 카메라 캡처.
//!
//! `ffmpeg -f video4linux2`로 한 프레임을 MJPEG로 받아온다.

use async_trait::async_trait;
use leafguard_core::error::CoreError;
use leafguard_core::models::capture::{CaptureResult, CaptureSource};
use leafguard_core::ports::capture::CaptureProvider;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{finish_capture, run_capture_command, CommandFailure};
use crate::store::CaptureStore;

/// USB 카메라
pub struct UsbCamera {
    device: String,
    width: u32,
    height: u32,
    store: Option<Arc<CaptureStore>>,
}

impl UsbCamera {
    pub fn new(device: String, width: u32, height: u32, store: Option<Arc<CaptureStore>>) -> Self {
        Self {
            device,
            width,
            height,
            store,
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-f", "video4linux2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend([
            "-video_size".to_string(),
            format!("{}x{}", self.width, self.height),
            "-i".to_string(),
            self.device.clone(),
        ]);
        args.extend(
            ["-frames:v", "1", "-f", "image2pipe", "-vcodec", "mjpeg", "-"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }
}

#[async_trait]
impl CaptureProvider for UsbCamera {
    async fn capture(&self) -> Result<CaptureResult, CoreError> {
        if tokio::fs::metadata(&self.device).await.is_err() {
            return Err(CoreError::Capture(format!(
                "camera not found: {}",
                self.device
            )));
        }

        match run_capture_command("ffmpeg", &self.args()).await {
            Ok(bytes) => {
                debug!("USB 카메라 캡처 완료: {} ({}bytes)", self.device, bytes.len());
                finish_capture(CaptureSource::UsbCamera, bytes, self.store.as_deref()).await
            }
            Err(CommandFailure::NotFound) => {
                Err(CoreError::Capture("ffmpeg 미설치".to_string()))
            }
            Err(CommandFailure::Failed(reason)) => {
                warn!("USB 카메라 캡처 실패: {reason}");
                Err(CoreError::Capture(format!("{} ({reason})", self.device)))
            }
        }
    }

    fn source_kind(&self) -> CaptureSource {
        CaptureSource::UsbCamera
    }
}
