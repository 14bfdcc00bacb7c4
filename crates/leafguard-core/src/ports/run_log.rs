//! 실행 기록 저장 포트.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::run::RunRecord;

/// 추가 전용 실행 기록 저장소
///
/// 수정/삭제 연산은 없다. `append`가 반환되면 기록은 재시작 후에도 유지된다.
#[async_trait]
pub trait RunLog: Send + Sync {
    /// 기록 추가, 부여된 ID 반환
    async fn append(&self, record: &RunRecord) -> Result<i64, CoreError>;

    /// 최근 기록 `n`개 (최신순)
    async fn list_recent(&self, n: usize) -> Result<Vec<RunRecord>, CoreError>;

    /// 전체 기록 수
    async fn count(&self) -> Result<u64, CoreError>;
}
