//! slave API 핸들러.
//!
//! master의 원격 구동 요청을 받아 로컬 분무기 컨트롤러로 전달한다.
//! 응답 본문은 항상 `{status, message?, duration_ms?, timestamp?}` 형식이다.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use leafguard_actuator::controller::{SprayerState, SprayerStats};
use leafguard_core::error::CoreError;
use leafguard_core::models::actuation::SlaveResponse;
use leafguard_core::models::decision::{Decision, SprayAction};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::SlaveState;

/// `/test` 기본 분무 시간
pub const DEFAULT_TEST_DURATION_MS: u64 = 1_000;

/// `/sprinkle` 요청 본문
#[derive(Debug, Deserialize)]
pub struct SprinkleRequest {
    pub action: String,
    #[serde(default, alias = "duration")]
    pub duration_ms: u64,
}

/// `/test` 요청 본문
#[derive(Debug, Default, Deserialize)]
pub struct TestRequest {
    #[serde(default, alias = "duration")]
    pub duration_ms: Option<u64>,
}

/// 헬스 응답
#[derive(Debug, Serialize)]
pub struct SlaveHealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub gpio_pin: u32,
    pub driver: &'static str,
    pub sprayer_state: SprayerState,
    pub statistics: SprayerStats,
}

/// 상태 응답
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub gpio_pin: u32,
    pub sprayer_state: SprayerState,
    /// 기동 후 경과 초
    pub uptime_secs: f64,
}

/// 통계 응답
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub statistics: SprayerStats,
    pub average_duration_ms: f64,
}

/// 요청 → 결정 변환
fn parse_command(action: &str, duration_ms: u64, max_ms: u64) -> Result<Decision, String> {
    let action = match action.trim().to_ascii_lowercase().as_str() {
        "on" => SprayAction::On,
        "off" => SprayAction::Off,
        other => return Err(format!("unknown action: {other:?}")),
    };

    if action == SprayAction::On {
        if duration_ms == 0 {
            return Err("duration_ms must be positive for action \"on\"".to_string());
        }
        if duration_ms > max_ms {
            return Err(format!(
                "duration_ms {duration_ms} exceeds maximum {max_ms}"
            ));
        }
    }

    Ok(Decision::command(action, duration_ms))
}

fn reply(status: StatusCode, body: SlaveResponse) -> Response {
    (status, Json(body)).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    let message = message.into();
    warn!("잘못된 구동 요청: {message}");
    reply(StatusCode::BAD_REQUEST, SlaveResponse::error(message))
}

async fn execute(state: &SlaveState, decision: &Decision) -> Response {
    match state.controller.execute(decision).await {
        Ok(_) => {
            let message = match decision.action {
                SprayAction::On => format!("sprayed for {}ms", decision.duration_ms),
                SprayAction::Off => "sprayer off".to_string(),
            };
            reply(
                StatusCode::OK,
                SlaveResponse::success(message, decision.duration_ms),
            )
        }
        Err(CoreError::SprayerBusy) => reply(
            StatusCode::CONFLICT,
            SlaveResponse::error(CoreError::SprayerBusy.to_string()),
        ),
        Err(e) => {
            error!("분무기 구동 실패: {e}");
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                SlaveResponse::error(e.to_string()),
            )
        }
    }
}

/// POST /sprinkle
pub async fn sprinkle(
    State(state): State<SlaveState>,
    payload: Result<Json<SprinkleRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let decision = match parse_command(
        &request.action,
        request.duration_ms,
        state.max_spray_duration_ms,
    ) {
        Ok(d) => d,
        Err(msg) => return bad_request(msg),
    };

    info!(
        action = %decision.action,
        duration_ms = decision.duration_ms,
        "원격 구동 요청 수신"
    );
    execute(&state, &decision).await
}

/// POST /test
///
/// 본문이 없으면 기본 시간으로 분무한다.
pub async fn test_spray(State(state): State<SlaveState>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        TestRequest::default()
    } else {
        match serde_json::from_slice::<TestRequest>(&body) {
            Ok(r) => r,
            Err(e) => return bad_request(format!("invalid request body: {e}")),
        }
    };

    let duration_ms = request.duration_ms.unwrap_or(DEFAULT_TEST_DURATION_MS);
    let decision = match parse_command("on", duration_ms, state.max_spray_duration_ms) {
        Ok(d) => d,
        Err(msg) => return bad_request(msg),
    };

    info!(duration_ms, "테스트 분무 요청");
    execute(&state, &decision).await
}

/// GET /health
pub async fn health(State(state): State<SlaveState>) -> Json<SlaveHealthResponse> {
    Json(SlaveHealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        gpio_pin: state.gpio_pin,
        driver: state.controller.driver_name(),
        sprayer_state: state.controller.state(),
        statistics: state.controller.stats(),
    })
}

/// GET /status
pub async fn status(State(state): State<SlaveState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ready",
        timestamp: Utc::now(),
        gpio_pin: state.gpio_pin,
        sprayer_state: state.controller.state(),
        uptime_secs: state.started_at.elapsed().as_secs_f64(),
    })
}

/// GET /stats
pub async fn stats(State(state): State<SlaveState>) -> Json<StatsResponse> {
    let statistics = state.controller.stats();
    let average_duration_ms = statistics.average_duration_ms();
    Json(StatsResponse {
        statistics,
        average_duration_ms,
    })
}
