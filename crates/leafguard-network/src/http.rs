//! 원격 판별 백엔드 공통 HTTP 처리.
//!
//! 전송 에러와 상태 코드를 `DetectionFailure`로 분류한다.

use base64::Engine;
use leafguard_core::error::{CoreError, DetectionFailure};
use leafguard_core::models::capture::{CaptureResult, ImageFormat};
use std::time::Duration;
use tracing::warn;

/// 에러 메시지에 남길 응답 본문 최대 길이
const MAX_ERROR_BODY_CHARS: usize = 200;

/// 타임아웃이 설정된 HTTP 클라이언트 생성
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, CoreError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 생성 실패: {e}")))
}

/// 전송 에러 분류
pub(crate) fn send_error(backend: &str, err: reqwest::Error) -> CoreError {
    if err.is_timeout() {
        CoreError::detection(
            DetectionFailure::Timeout,
            format!("{backend} 요청 시간 초과: {err}"),
        )
    } else {
        CoreError::detection(
            DetectionFailure::Network,
            format!("{backend} 호출 실패: {err}"),
        )
    }
}

/// 응답 상태 확인 후 본문 반환
pub(crate) async fn read_body(
    backend: &str,
    response: reqwest::Response,
) -> Result<String, CoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| send_error(backend, e))?;

    if status.is_success() {
        return Ok(body);
    }

    warn!(status = %status, backend, "판별 API 오류 응답");
    let detail: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    let kind = match status.as_u16() {
        401 | 403 => DetectionFailure::Auth,
        429 => DetectionFailure::Quota,
        415 => DetectionFailure::UnsupportedImage,
        _ => DetectionFailure::Network,
    };
    Err(CoreError::detection(
        kind,
        format!("{backend} API 오류 ({status}): {detail}"),
    ))
}

/// 업로드용 (MIME, base64) 생성
///
/// 선언된 포맷과 실제 바이트가 다르면 `UnsupportedImage`.
pub(crate) fn encode_image(capture: &CaptureResult) -> Result<(&'static str, String), CoreError> {
    match ImageFormat::sniff(&capture.image_bytes) {
        Some(format) if format == capture.image_format => Ok((
            format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&capture.image_bytes),
        )),
        _ => Err(CoreError::detection(
            DetectionFailure::UnsupportedImage,
            format!(
                "지원하지 않는 이미지 ({:?}, {}bytes)",
                capture.image_format,
                capture.image_bytes.len()
            ),
        )),
    }
}

/// 본문을 JSON으로 해석. 실패는 `MalformedResponse`
pub(crate) fn parse_json(backend: &str, body: &str) -> Result<serde_json::Value, CoreError> {
    serde_json::from_str(body).map_err(|e| {
        CoreError::detection(
            DetectionFailure::MalformedResponse,
            format!("{backend} 응답 JSON 파싱 실패: {e}"),
        )
    })
}
