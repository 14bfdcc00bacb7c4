//! master → slave 원격 구동 클라이언트.
//!
//! `POST {slave}/sprinkle` 본문 `{action, duration_ms}`, 응답 `{status, message?}`.
//!
//! - 시도당 타임아웃 = `SLAVE_TIMEOUT_SECS` + 분무 시간 (slave는 분무가 끝난 뒤 응답)
//! - 연결 자체가 실패한 경우에만 짧은 대기 후 정확히 1회 재시도
//! - 타임아웃은 재시도하지 않는다 (slave가 이미 분무 중일 수 있음)

use async_trait::async_trait;
use leafguard_core::error::CoreError;
use leafguard_core::models::actuation::{ActuationTarget, SlaveResponse, SlaveStatus};
use leafguard_core::models::decision::Decision;
use leafguard_core::ports::actuator::SprayerDriver;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 연결 실패 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 1;

/// `/sprinkle` 요청 본문
#[derive(Debug, Serialize)]
struct SprinkleRequest {
    action: &'static str,
    duration_ms: u64,
}

/// 원격 slave 구동 드라이버
#[derive(Debug)]
pub struct SlaveClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry_backoff: Duration,
}

impl SlaveClient {
    /// 새 클라이언트 생성
    ///
    /// 타임아웃은 요청마다 분무 시간을 더해 지정하므로 클라이언트 전역 타임아웃은 두지 않는다.
    pub fn new(base_url: &str, timeout: Duration, retry_backoff: Duration) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 생성 실패: {e}")))?;

        let base_url = base_url.trim_end_matches('/');
        let base_url = base_url.strip_suffix("/sprinkle").unwrap_or(base_url);
        info!("원격 구동 대상: {base_url}");

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            timeout,
            retry_backoff,
        })
    }

    /// slave 기본 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `/sprinkle` 호출 (연결 실패 시 1회 재시도)
    pub async fn sprinkle(&self, decision: &Decision) -> Result<SlaveResponse, CoreError> {
        let attempt_timeout = self.timeout + Duration::from_millis(decision.duration_ms);
        let body = SprinkleRequest {
            action: decision.action.as_str(),
            duration_ms: decision.duration_ms,
        };
        let url = format!("{}/sprinkle", self.base_url);

        for attempt in 0..=MAX_RETRIES {
            debug!(
                attempt = attempt + 1,
                action = body.action,
                duration_ms = body.duration_ms,
                "slave 구동 요청"
            );

            let result = self
                .http_client
                .post(&url)
                .timeout(attempt_timeout)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) => return Self::read_sprinkle_response(response).await,
                Err(e) if e.is_timeout() => {
                    warn!("slave 응답 시간 초과 ({attempt_timeout:?})");
                    return Err(CoreError::Actuation(format!(
                        "slave 응답 시간 초과 ({}ms): {e}",
                        attempt_timeout.as_millis()
                    )));
                }
                Err(e) if e.is_connect() && attempt < MAX_RETRIES => {
                    warn!(
                        "slave 연결 실패 (시도 {}/{}): {e}, {:?} 후 재시도",
                        attempt + 1,
                        MAX_RETRIES + 1,
                        self.retry_backoff
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => {
                    return Err(CoreError::Actuation(format!(
                        "slave 연결 실패 (시도 {}회): {e}",
                        attempt + 1
                    )));
                }
            }
        }

        Err(CoreError::Actuation("slave 요청 실패".to_string()))
    }

    async fn read_sprinkle_response(
        response: reqwest::Response,
    ) -> Result<SlaveResponse, CoreError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CoreError::Actuation(format!("slave 응답 읽기 실패: {e}")))?;
        let parsed = serde_json::from_str::<SlaveResponse>(&text);

        if !status.is_success() {
            let message = match parsed {
                Ok(SlaveResponse {
                    message: Some(message),
                    ..
                }) => message,
                _ => text.chars().take(200).collect(),
            };
            return Err(CoreError::Actuation(format!("slave 오류 ({status}): {message}")));
        }

        let parsed = parsed
            .map_err(|e| CoreError::Actuation(format!("slave 응답 파싱 실패: {e}")))?;
        if parsed.status == SlaveStatus::Error {
            return Err(CoreError::Actuation(format!(
                "slave 실패 응답: {}",
                parsed.message.as_deref().unwrap_or("사유 없음")
            )));
        }
        Ok(parsed)
    }

    /// slave `/health` 조회
    pub async fn health(&self) -> Result<serde_json::Value, CoreError> {
        let response = self
            .http_client
            .get(format!("{}/health", self.base_url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("slave 헬스체크 실패: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Network(format!("slave 헬스체크 오류 ({status})")));
        }
        response
            .json()
            .await
            .map_err(|e| CoreError::Network(format!("slave 헬스 응답 파싱 실패: {e}")))
    }
}

#[async_trait]
impl SprayerDriver for SlaveClient {
    async fn drive(&self, decision: &Decision) -> Result<Option<SlaveResponse>, CoreError> {
        self.sprinkle(decision).await.map(Some)
    }

    fn target(&self) -> ActuationTarget {
        ActuationTarget::RemoteSlave
    }

    fn name(&self) -> &'static str {
        "remote-slave"
    }
}
