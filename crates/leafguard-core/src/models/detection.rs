//! 병해 판별 결과 모델.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, DetectionFailure};

/// 심각도 하한
pub const SEVERITY_MIN: f64 = 0.0;
/// 심각도 상한
pub const SEVERITY_MAX: f64 = 100.0;

/// 판별 백엔드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 외부 의존성 없는 모의 판별기
    Mock,
    /// plant.id 건강 진단 API
    #[serde(alias = "plant-id", alias = "plant_id")]
    PlantId,
    /// Gemini 멀티모달 모델
    Gemini,
    /// 온디바이스 TFLite 모델 (미구현)
    Tflite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::PlantId => "plantid",
            Self::Gemini => "gemini",
            Self::Tflite => "tflite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 판별 결과 (생성 후 불변)
///
/// 반드시 [`DetectionResult::new`]로 생성한다. 심각도 범위와 라벨을 검증한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// 병명 (예: "healthy", "blight")
    pub disease_label: String,
    /// 심각도 (0–100)
    pub severity: f64,
    /// 판별 백엔드
    pub backend_kind: BackendKind,
    /// 백엔드 원본 응답 (진단용)
    #[serde(default)]
    pub raw_backend_payload: serde_json::Value,
}

impl DetectionResult {
    /// 검증된 판별 결과 생성
    ///
    /// 라벨이 비어 있거나 심각도가 범위를 벗어나면 `MalformedResponse` 판별 에러.
    /// 범위 밖 값을 잘라내지 않는다.
    pub fn new(
        disease_label: impl Into<String>,
        severity: f64,
        backend_kind: BackendKind,
        raw_backend_payload: serde_json::Value,
    ) -> Result<Self, CoreError> {
        let disease_label = disease_label.into().trim().to_string();
        if disease_label.is_empty() {
            return Err(CoreError::detection(
                DetectionFailure::MalformedResponse,
                format!("{backend_kind}: 병명 라벨이 비어 있음"),
            ));
        }
        if !severity.is_finite() || !(SEVERITY_MIN..=SEVERITY_MAX).contains(&severity) {
            return Err(CoreError::detection(
                DetectionFailure::MalformedResponse,
                format!("{backend_kind}: 심각도 범위 초과 ({severity})"),
            ));
        }

        Ok(Self {
            disease_label,
            severity,
            backend_kind,
            raw_backend_payload,
        })
    }

    /// 건강 판정 여부
    pub fn is_healthy(&self) -> bool {
        self.disease_label.eq_ignore_ascii_case("healthy")
    }
}
