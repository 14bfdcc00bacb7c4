//! 캡처 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::capture::{CaptureResult, CaptureSource};

/// 정지 이미지 한 장을 획득하는 소스
///
/// 프로세스당 설정으로 하나만 선택된다.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// 이미지 캡처. 소스 사용 불가 시 `CoreError::Capture`
    async fn capture(&self) -> Result<CaptureResult, CoreError>;

    /// 소스 종류
    fn source_kind(&self) -> CaptureSource;
}
