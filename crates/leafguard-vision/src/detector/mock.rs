//! 모의 판별기.
//!
//! 이미지 바이트의 SHA-256에서 라벨과 심각도를 유도한다. 외부 호출이 없고
//! 같은 이미지에는 항상 같은 결과를 낸다.

use async_trait::async_trait;
use leafguard_core::error::CoreError;
use leafguard_core::models::capture::CaptureResult;
use leafguard_core::models::detection::{BackendKind, DetectionResult};
use leafguard_core::ports::detection::DetectionBackend;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

/// 모의 판별 라벨
pub const MOCK_LABELS: [&str; 5] = ["healthy", "blight", "rust", "mildew", "leaf spot"];

/// 병해 라벨의 심각도 하한 (0.1 단위)
const DISEASED_MIN_TENTHS: u64 = 200;
/// 병해 라벨의 심각도 폭 (20.0–90.0)
const DISEASED_SPAN_TENTHS: u64 = 701;

/// 모의 판별기
#[derive(Debug, Default)]
pub struct MockDetector;

impl MockDetector {
    pub fn new() -> Self {
        Self
    }

    /// 이미지 바이트로 (라벨, 심각도) 계산
    pub fn classify(image_bytes: &[u8]) -> (&'static str, f64) {
        let digest = Sha256::digest(image_bytes);
        let label = MOCK_LABELS[digest[0] as usize % MOCK_LABELS.len()];
        if label == "healthy" {
            return (label, 0.0);
        }

        let raw = u64::from(u16::from_be_bytes([digest[1], digest[2]]));
        let tenths = DISEASED_MIN_TENTHS + raw % DISEASED_SPAN_TENTHS;
        (label, tenths as f64 / 10.0)
    }
}

#[async_trait]
impl DetectionBackend for MockDetector {
    async fn detect(&self, capture: &CaptureResult) -> Result<DetectionResult, CoreError> {
        let (label, severity) = Self::classify(&capture.image_bytes);
        debug!("모의 판별: {label} ({severity})");

        DetectionResult::new(
            label,
            severity,
            BackendKind::Mock,
            json!({ "label": label, "severity": severity, "simulated": true }),
        )
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Mock
    }
}
