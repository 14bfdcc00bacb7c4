//! LeafGuard 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 이 타입을 그대로 반환하거나 자체 에러에서 래핑한다.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 판별(Detection) 실패 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionFailure {
    /// 연결 실패 또는 비정상 HTTP 상태
    Network,
    /// 요청 타임아웃
    Timeout,
    /// 인증 실패 (401/403)
    Auth,
    /// 사용량 한도 초과 (429)
    Quota,
    /// 응답 본문을 해석할 수 없음
    MalformedResponse,
    /// 지원하지 않는 이미지 포맷
    UnsupportedImage,
    /// 백엔드 자체가 사용 불가 (미구현 등)
    Unavailable,
}

impl DetectionFailure {
    /// 기록용 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::MalformedResponse => "malformed-response",
            Self::UnsupportedImage => "unsupported-image",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for DetectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류 (시작 시점에 치명적)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 카메라/이미지 소스 사용 불가
    #[error("캡처 에러: {0}")]
    Capture(String),

    /// 판별 백엔드 실패
    #[error("판별 에러 ({kind}): {message}")]
    Detection {
        /// 실패 사유 분류
        kind: DetectionFailure,
        /// 상세 메시지
        message: String,
    },

    /// 분무기 구동 실패 (하드웨어 오류, 원격 장치 응답 없음/실패)
    #[error("구동 에러: {0}")]
    Actuation(String),

    /// 분무기가 다른 요청을 처리 중
    #[error("sprayer busy")]
    SprayerBusy,

    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 판별 에러 생성 헬퍼
    pub fn detection(kind: DetectionFailure, message: impl Into<String>) -> Self {
        Self::Detection {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_error_display_includes_kind() {
        let err = CoreError::detection(DetectionFailure::MalformedResponse, "severity 누락");
        let text = err.to_string();
        assert!(text.contains("malformed-response"));
        assert!(text.contains("severity 누락"));
    }

    #[test]
    fn busy_message_is_stable() {
        assert_eq!(CoreError::SprayerBusy.to_string(), "sprayer busy");
    }

    #[test]
    fn failure_serializes_kebab_case() {
        let json = serde_json::to_string(&DetectionFailure::UnsupportedImage).unwrap();
        assert_eq!(json, "\"unsupported-image\"");
    }
}
