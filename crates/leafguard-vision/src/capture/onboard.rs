//! Raspberry Pi 카메라 모듈 캡처.
//!
//! `rpicam-still`(Bookworm 이후) 또는 `libcamera-still`로 JPEG 한 장을 stdout으로 받는다.

use async_trait::async_trait;
use leafguard_core::error::CoreError;
use leafguard_core::models::capture::{CaptureResult, CaptureSource};
use leafguard_core::ports::capture::CaptureProvider;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{finish_capture, run_capture_command, CommandFailure};
use crate::store::CaptureStore;

/// 시도 순서대로의 캡처 CLI
const STILL_PROGRAMS: [&str; 2] = ["rpicam-still", "libcamera-still"];

/// 보드 내장 카메라
pub struct OnboardCamera {
    width: u32,
    height: u32,
    store: Option<Arc<CaptureStore>>,
    programs: Vec<String>,
}

impl OnboardCamera {
    pub fn new(width: u32, height: u32, store: Option<Arc<CaptureStore>>) -> Self {
        Self {
            width,
            height,
            store,
            programs: STILL_PROGRAMS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// 캡처 CLI 목록 교체
    pub fn with_programs(mut self, programs: Vec<String>) -> Self {
        self.programs = programs;
        self
    }

    fn args(&self) -> Vec<String> {
        vec![
            "--nopreview".to_string(),
            "--immediate".to_string(),
            "--encoding".to_string(),
            "jpg".to_string(),
            "--width".to_string(),
            self.width.to_string(),
            "--height".to_string(),
            self.height.to_string(),
            "--output".to_string(),
            "-".to_string(),
        ]
    }
}

#[async_trait]
impl CaptureProvider for OnboardCamera {
    async fn capture(&self) -> Result<CaptureResult, CoreError> {
        let args = self.args();

        for program in &self.programs {
            match run_capture_command(program, &args).await {
                Ok(bytes) => {
                    debug!("보드 카메라 캡처 완료: {program} ({}bytes)", bytes.len());
                    return finish_capture(CaptureSource::OnboardCamera, bytes, self.store.as_deref())
                        .await;
                }
                Err(CommandFailure::NotFound) => {
                    debug!("{program} 없음, 다음 CLI 시도");
                }
                Err(CommandFailure::Failed(reason)) => {
                    warn!("보드 카메라 캡처 실패: {reason}");
                    return Err(CoreError::Capture(reason));
                }
            }
        }

        Err(CoreError::Capture(format!(
            "camera not found: {} 미설치",
            self.programs.join("/")
        )))
    }

    fn source_kind(&self) -> CaptureSource {
        CaptureSource::OnboardCamera
    }
}
