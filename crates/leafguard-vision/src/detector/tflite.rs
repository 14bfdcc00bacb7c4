//! 온디바이스 TFLite 판별기 자리표시자.
//!
//! 모델 실행은 아직 없다. 임의 결과를 만들지 않고 즉시 실패한다.

use async_trait::async_trait;
use leafguard_core::error::{CoreError, DetectionFailure};
use leafguard_core::models::capture::CaptureResult;
use leafguard_core::models::detection::{BackendKind, DetectionResult};
use leafguard_core::ports::detection::DetectionBackend;

/// TFLite 판별기 (미구현)
#[derive(Debug, Default)]
pub struct TfliteDetector;

impl TfliteDetector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DetectionBackend for TfliteDetector {
    async fn detect(&self, _capture: &CaptureResult) -> Result<DetectionResult, CoreError> {
        Err(CoreError::detection(
            DetectionFailure::Unavailable,
            "on-device model not implemented",
        ))
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Tflite
    }
}
