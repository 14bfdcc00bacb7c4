//! 병해 판별 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::capture::CaptureResult;
use crate::models::detection::{BackendKind, DetectionResult};

/// 병해 판별 백엔드
///
/// 각 구현체는 자체 응답 해석 로직을 가지며 결과는 항상
/// [`DetectionResult::new`]를 거쳐 검증된다.
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    /// 이미지 판별. 실패 시 `CoreError::Detection`
    async fn detect(&self, capture: &CaptureResult) -> Result<DetectionResult, CoreError>;

    /// 백엔드 종류
    fn backend_kind(&self) -> BackendKind;

    /// 외부 네트워크 호출 여부
    fn is_external(&self) -> bool {
        false
    }
}
