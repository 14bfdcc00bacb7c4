//! Gemini 멀티모달 모델 판별 백엔드.
//!
//! 이미지와 함께 `{"disease": ..., "severity": ...}` JSON만 답하도록 지시하고,
//! 응답 텍스트의 첫 `{`부터 마지막 `}`까지를 해석한다. 숫자가 아니거나 0–100 범위를
//! 벗어난 심각도는 잘라내지 않고 `MalformedResponse`로 처리한다.

use async_trait::async_trait;
use leafguard_core::error::{CoreError, DetectionFailure};
use leafguard_core::models::capture::CaptureResult;
use leafguard_core::models::detection::{BackendKind, DetectionResult};
use leafguard_core::ports::detection::DetectionBackend;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::http::{build_client, encode_image, parse_json, read_body, send_error};

const BACKEND: &str = "gemini";

/// 판별 지시 프롬프트
const DETECTION_PROMPT: &str = "You are a plant pathologist. Examine the leaf in this image and \
respond with ONLY a compact JSON object, no prose and no markdown: \
{\"disease\": \"<disease name, or healthy>\", \"severity\": <integer 0-100>}. \
Use \"healthy\" with severity 0 when no disease is visible. \
Severity is the estimated share of affected leaf tissue in percent.";

/// Gemini 클라이언트
#[derive(Debug)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    /// API 기본 URL (예: `https://generativelanguage.googleapis.com/v1beta`)
    endpoint: String,
    model: String,
    /// API 키 (메모리에만 유지)
    api_key: String,
}

impl GeminiClient {
    /// 새 클라이언트 생성. API 키가 비어 있으면 설정 에러
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        if api_key.trim().is_empty() {
            return Err(CoreError::Config("GEMINI_API_KEY 미설정".into()));
        }

        debug!(endpoint, model, timeout = ?timeout, "GeminiClient 초기화");

        Ok(Self {
            http_client: build_client(timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    /// `generateContent` 응답에서 첫 후보의 텍스트 추출
    fn candidate_text(response: &Value) -> Result<String, CoreError> {
        let parts = response
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                let reason = response
                    .pointer("/promptFeedback/blockReason")
                    .and_then(Value::as_str)
                    .unwrap_or("candidates 누락");
                malformed(format!("응답 후보 없음 ({reason})"))
            })?;

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();

        if text.trim().is_empty() {
            return Err(malformed("빈 응답 텍스트".to_string()));
        }
        Ok(text)
    }

    /// 모델 텍스트를 판별 결과로 변환
    fn parse_model_text(text: &str, raw: Value) -> Result<DetectionResult, CoreError> {
        let json_span = match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => &text[start..=end],
            _ => {
                let preview: String = text.chars().take(120).collect();
                return Err(malformed(format!("JSON 객체 없음: {preview}")));
            }
        };

        let parsed: Value = serde_json::from_str(json_span)
            .map_err(|e| malformed(format!("모델 출력 JSON 파싱 실패: {e}")))?;

        let label = parsed
            .get("disease")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("disease 누락".to_string()))?;

        let severity = match parsed.get("severity") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| malformed(format!("severity가 숫자가 아님: {}", parsed["severity"])))?;

        DetectionResult::new(label, severity, BackendKind::Gemini, raw)
    }
}

fn malformed(message: String) -> CoreError {
    CoreError::detection(
        DetectionFailure::MalformedResponse,
        format!("{BACKEND}: {message}"),
    )
}

#[async_trait]
impl DetectionBackend for GeminiClient {
    async fn detect(&self, capture: &CaptureResult) -> Result<DetectionResult, CoreError> {
        let (mime, encoded) = encode_image(capture)?;
        let request_body = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": DETECTION_PROMPT },
                    { "inline_data": { "mime_type": mime, "data": encoded } }
                ]
            }],
            "generationConfig": { "temperature": 0.1 }
        });

        debug!(model = %self.model, image_size = capture.image_bytes.len(), "Gemini 판별 호출");

        let response = self
            .http_client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| send_error(BACKEND, e))?;

        let body = read_body(BACKEND, response).await?;
        let raw = parse_json(BACKEND, &body)?;
        let text = Self::candidate_text(&raw)?;

        Self::parse_model_text(&text, raw).inspect_err(|e| {
            warn!("Gemini 출력 해석 실패: {e}");
        })
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Gemini
    }

    fn is_external(&self) -> bool {
        true
    }
}
