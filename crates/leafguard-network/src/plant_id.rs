//! plant.id 건강 진단 API 판별 백엔드.
//!
//! `POST /api/v3/health_assessment` 응답의 `is_healthy`와 병해 후보를
//! `disease_label`/`severity`로 사상한다.
//!
//! - severity = `(1 − is_healthy.probability) × 100`
//! - label = `is_healthy.binary`가 참이면 `"healthy"`, 아니면 최상위 병해 후보 이름

use async_trait::async_trait;
use leafguard_core::error::{CoreError, DetectionFailure};
use leafguard_core::models::capture::CaptureResult;
use leafguard_core::models::detection::{BackendKind, DetectionResult};
use leafguard_core::ports::detection::DetectionBackend;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::http::{build_client, encode_image, parse_json, read_body, send_error};

const BACKEND: &str = "plant.id";

/// plant.id 클라이언트
#[derive(Debug)]
pub struct PlantIdClient {
    http_client: reqwest::Client,
    endpoint: String,
    /// API 키 (메모리에만 유지)
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct HealthAssessment {
    result: AssessmentResult,
}

#[derive(Debug, Deserialize)]
struct AssessmentResult {
    is_healthy: Option<Prediction>,
    #[serde(default)]
    disease: Option<DiseaseBlock>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    binary: Option<bool>,
    probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DiseaseBlock {
    #[serde(default)]
    suggestions: Vec<DiseaseSuggestion>,
}

#[derive(Debug, Deserialize)]
struct DiseaseSuggestion {
    name: String,
    #[serde(default)]
    probability: f64,
}

impl PlantIdClient {
    /// 새 클라이언트 생성. API 키가 비어 있으면 설정 에러
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, CoreError> {
        if api_key.trim().is_empty() {
            return Err(CoreError::Config("PLANT_ID_API_KEY 미설정".into()));
        }

        debug!(endpoint, timeout = ?timeout, "PlantIdClient 초기화");

        Ok(Self {
            http_client: build_client(timeout)?,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// 응답 본문을 판별 결과로 변환
    fn parse_assessment(body: &str) -> Result<DetectionResult, CoreError> {
        let raw = parse_json(BACKEND, body)?;
        let assessment: HealthAssessment = serde_json::from_value(raw.clone())
            .map_err(|e| malformed(format!("응답 구조 불일치: {e}")))?;

        let is_healthy = assessment
            .result
            .is_healthy
            .ok_or_else(|| malformed("is_healthy 누락".to_string()))?;
        let probability = is_healthy
            .probability
            .ok_or_else(|| malformed("is_healthy.probability 누락".to_string()))?;
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(malformed(format!("확률 범위 초과: {probability}")));
        }
        let healthy = is_healthy.binary.unwrap_or(probability >= 0.5);

        let label = if healthy {
            "healthy".to_string()
        } else {
            assessment
                .result
                .disease
                .and_then(|d| {
                    d.suggestions
                        .into_iter()
                        .max_by(|a, b| a.probability.total_cmp(&b.probability))
                })
                .map(|s| s.name)
                .ok_or_else(|| malformed("비건강 판정이지만 병해 후보 없음".to_string()))?
        };

        let severity = ((1.0 - probability) * 1000.0).round() / 10.0;
        DetectionResult::new(label, severity, BackendKind::PlantId, raw)
    }
}

fn malformed(message: String) -> CoreError {
    CoreError::detection(
        DetectionFailure::MalformedResponse,
        format!("{BACKEND}: {message}"),
    )
}

#[async_trait]
impl DetectionBackend for PlantIdClient {
    async fn detect(&self, capture: &CaptureResult) -> Result<DetectionResult, CoreError> {
        let (mime, encoded) = encode_image(capture)?;
        let request_body = serde_json::json!({
            "images": [format!("data:{mime};base64,{encoded}")],
            "similar_images": false,
        });

        debug!(
            endpoint = %self.endpoint,
            image_size = capture.image_bytes.len(),
            "plant.id 건강 진단 호출"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Api-Key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| send_error(BACKEND, e))?;

        let body = read_body(BACKEND, response).await?;
        let result = Self::parse_assessment(&body)?;
        debug!(label = %result.disease_label, severity = result.severity, "plant.id 판별 완료");
        Ok(result)
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::PlantId
    }

    fn is_external(&self) -> bool {
        true
    }
}
