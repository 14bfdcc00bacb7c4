//! 분무기 구동 포트.
//!
//! - [`SprayerDriver`] — 실제 신호를 내보내는 저수준 드라이버 (GPIO, 시뮬레이션, 원격)
//! - [`Actuator`] — 파이프라인이 호출하는 상위 계약. 실패를 결과 값으로 돌려준다.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::actuation::{ActuationOutcome, ActuationTarget, SlaveResponse};
use crate::models::decision::Decision;

/// 분무기 드라이버
///
/// `drive`는 `duration_ms` 동안 분무 후 반환한다. 구동 중 취소는 지원하지 않는다.
#[async_trait]
pub trait SprayerDriver: Send + Sync {
    /// 결정 실행. 원격 드라이버는 슬레이브 응답을 함께 반환
    async fn drive(&self, decision: &Decision) -> Result<Option<SlaveResponse>, CoreError>;

    /// 구동 대상
    fn target(&self) -> ActuationTarget;

    /// 드라이버 이름 (로그/헬스 응답용)
    fn name(&self) -> &'static str;
}

/// 파이프라인용 구동기
///
/// 같은 분무기에 대한 구동 요청은 직렬화된다. 에러를 반환하지 않고
/// `ActuationOutcome { executed: false, error }`로 기록한다.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// 결정 실행
    async fn actuate(&self, decision: &Decision) -> ActuationOutcome;

    /// 구동 대상
    fn target(&self) -> ActuationTarget;
}
