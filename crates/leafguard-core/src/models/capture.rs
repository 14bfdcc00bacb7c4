//! 캡처 결과 모델.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 이미지 소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureSource {
    /// 보드 내장 카메라 (Raspberry Pi 카메라 모듈)
    #[serde(alias = "picamera2", alias = "onboard")]
    OnboardCamera,
    /// USB 카메라 (V4L2 장치)
    #[serde(alias = "opencv", alias = "usb")]
    UsbCamera,
    /// 합성 이미지 (개발/테스트용)
    Mock,
}

impl CaptureSource {
    /// 설정/기록용 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnboardCamera => "onboard-camera",
            Self::UsbCamera => "usb-camera",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이미지 포맷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// 매직 바이트로 포맷 판별
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    /// MIME 타입
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    /// 파일 확장자
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

/// 캡처 결과 (생성 후 불변)
///
/// `image_bytes`는 파이프라인 실행 동안만 메모리에 존재하며 직렬화되지 않는다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResult {
    /// 원본 이미지 바이트
    #[serde(skip)]
    pub image_bytes: Vec<u8>,
    /// 이미지 소스
    pub source_kind: CaptureSource,
    /// 캡처 시각
    pub captured_at: DateTime<Utc>,
    /// 저장된 이미지 파일 참조 (이미지 디렉토리 기준 상대 경로)
    pub file_reference: Option<String>,
    /// 이미지 포맷
    pub image_format: ImageFormat,
}

impl CaptureResult {
    /// 실행 기록에 남길 요약본 (이미지 바이트 제외)
    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            source_kind: self.source_kind,
            captured_at: self.captured_at,
            file_reference: self.file_reference.clone(),
        }
    }
}

/// 실행 기록용 캡처 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub source_kind: CaptureSource,
    pub captured_at: DateTime<Utc>,
    pub file_reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_known_formats() {
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(
            ImageFormat::sniff(b"\x89PNG\r\n\x1a\n0000"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::sniff(b"GIF89a"), None);
        assert_eq!(ImageFormat::sniff(&[]), None);
    }

    #[test]
    fn capture_source_accepts_legacy_names() {
        let src: CaptureSource = serde_json::from_str("\"picamera2\"").unwrap();
        assert_eq!(src, CaptureSource::OnboardCamera);
        let src: CaptureSource = serde_json::from_str("\"opencv\"").unwrap();
        assert_eq!(src, CaptureSource::UsbCamera);
        let src: CaptureSource = serde_json::from_str("\"usb-camera\"").unwrap();
        assert_eq!(src, CaptureSource::UsbCamera);
    }

    #[test]
    fn image_bytes_are_not_serialized() {
        let capture = CaptureResult {
            image_bytes: vec![1, 2, 3],
            source_kind: CaptureSource::Mock,
            captured_at: Utc::now(),
            file_reference: Some("2026-01-01/capture.jpg".to_string()),
            image_format: ImageFormat::Jpeg,
        };
        let json = serde_json::to_value(&capture).unwrap();
        assert!(json.get("image_bytes").is_none());
        assert_eq!(json["source_kind"], "mock");
    }
}
