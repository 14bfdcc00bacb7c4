//! # leafguard-vision
//!
//! 잎 이미지 획득과 로컬 판별을 담당한다.
//!
//! - [`capture`] — `CaptureProvider` 구현 (보드 카메라, USB 카메라, 합성 이미지)
//! - [`store`] — 일자별 캡처 파일 저장소 + 보존 정책
//! - [`detector`] — 외부 의존성 없는 `DetectionBackend` 구현 (mock, tflite 자리표시자)

pub mod capture;
pub mod detector;
pub mod store;
