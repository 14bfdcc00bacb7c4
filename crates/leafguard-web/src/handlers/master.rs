//! master API 핸들러.
//!
//! 대시보드(별도 프론트엔드)가 호출하는 트리거/조회 API.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use leafguard_core::models::actuation::ActuationTarget;
use leafguard_core::models::capture::CaptureSource;
use leafguard_core::models::detection::BackendKind;
use leafguard_core::models::run::RunSummary;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::MasterState;

/// 결과 목록 기본 개수
pub const DEFAULT_RESULTS_LIMIT: usize = 10;
/// 결과 목록 최대 개수
pub const MAX_RESULTS_LIMIT: usize = 100;

/// 결과 조회 쿼리
#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub limit: Option<usize>,
}

/// 결과 목록 응답
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
    /// 최신순 실행 요약
    pub results: Vec<RunSummary>,
    /// 전체 실행 기록 수
    pub total: u64,
    /// 적용된 조회 개수
    pub limit: usize,
}

/// 헬스 응답
#[derive(Debug, Serialize)]
pub struct MasterHealthResponse {
    pub status: &'static str,
    pub role: &'static str,
    pub backend: BackendKind,
    pub camera_source: CaptureSource,
    pub actuation_target: ActuationTarget,
    pub slave_url: Option<String>,
    pub total_runs: u64,
    pub timestamp: DateTime<Utc>,
}

/// slave 연결 확인 응답
#[derive(Debug, Serialize)]
pub struct SlaveConnectionResponse {
    pub status: &'static str,
    pub slave_url: String,
    /// slave `/health` 응답 원문
    pub slave: serde_json::Value,
}

/// POST /api/capture_and_detect
///
/// 파이프라인을 1회 실행하고 요약을 반환한다. 기록 저장 실패 시에만 500.
/// 실행은 별도 태스크에서 돌아 클라이언트가 연결을 끊어도 기록까지 마친다.
pub async fn capture_and_detect(
    State(state): State<MasterState>,
) -> Result<Json<RunSummary>, ApiError> {
    let pipeline = state.pipeline.clone();
    let record = tokio::spawn(async move { pipeline.run_once().await })
        .await
        .map_err(|e| ApiError::Internal(format!("파이프라인 태스크 실패: {e}")))??;
    Ok(Json(record.summary()))
}

/// GET /api/results?limit=n
pub async fn list_results(
    State(state): State<MasterState>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RESULTS_LIMIT)
        .min(MAX_RESULTS_LIMIT);

    let run_log = state.pipeline.run_log();
    let records = run_log.list_recent(limit).await?;
    let total = run_log.count().await?;

    Ok(Json(ResultsResponse {
        results: records.iter().map(|r| r.summary()).collect(),
        total,
        limit,
    }))
}

/// GET /api/health
pub async fn health(
    State(state): State<MasterState>,
) -> Result<Json<MasterHealthResponse>, ApiError> {
    let total_runs = state.pipeline.run_log().count().await?;

    Ok(Json(MasterHealthResponse {
        status: "healthy",
        role: "master",
        backend: state.pipeline.backend_kind(),
        camera_source: state.pipeline.source_kind(),
        actuation_target: state.pipeline.actuation_target(),
        slave_url: state.slave.as_ref().map(|s| s.base_url().to_string()),
        total_runs,
        timestamp: Utc::now(),
    }))
}

/// POST /api/test_slave_connection
pub async fn test_slave_connection(
    State(state): State<MasterState>,
) -> Result<Json<SlaveConnectionResponse>, ApiError> {
    let slave = state
        .slave
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("slave가 설정되지 않음 (SLAVE_URL)".to_string()))?;

    match slave.health().await {
        Ok(body) => {
            info!("slave 연결 확인: {}", slave.base_url());
            Ok(Json(SlaveConnectionResponse {
                status: "connected",
                slave_url: slave.base_url().to_string(),
                slave: body,
            }))
        }
        Err(e) => {
            warn!("slave 연결 확인 실패: {e}");
            Err(ApiError::BadGateway(e.to_string()))
        }
    }
}
