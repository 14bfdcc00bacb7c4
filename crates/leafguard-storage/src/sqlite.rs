//! SQLite 실행 기록 어댑터 (`RunLog` 포트 구현).
//!
//! 기록 전체는 `payload` 컬럼에 JSON으로 저장하고,
//! 조회/필터용 컬럼 몇 개만 비정규화해 둔다.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use leafguard_core::error::CoreError;
use leafguard_core::models::run::{RunRecord, RunStage};
use leafguard_core::ports::run_log::RunLog;
use rusqlite::Connection;
use tracing::{debug, error, info};

use crate::migration;

/// SQLite 실행 기록 저장소
pub struct SqliteRunLog {
    conn: Mutex<Connection>,
}

impl SqliteRunLog {
    /// 파일 기반 저장소 생성
    ///
    /// 상위 디렉토리가 없으면 만든다. `append` 반환 시점에 디스크 반영을
    /// 보장하도록 `synchronous=FULL`을 쓴다.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| CoreError::Storage(format!("SQLite 열기 실패: {e}")))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;
            PRAGMA temp_store=MEMORY;
            PRAGMA busy_timeout=5000;
            ",
        )
        .map_err(|e| CoreError::Storage(format!("PRAGMA 설정 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        info!("실행 기록 저장소 초기화: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 인메모리 저장소 생성 (테스트용)
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Storage(format!("인메모리 SQLite 생성 실패: {e}")))?;

        migration::run_migrations(&conn)
            .map_err(|e| CoreError::Storage(format!("마이그레이션 실패: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Storage(format!("잠금 획득 실패: {e}")))
    }
}

#[async_trait]
impl RunLog for SqliteRunLog {
    async fn append(&self, record: &RunRecord) -> Result<i64, CoreError> {
        // id는 저장소가 부여한다
        let mut stored = record.clone();
        stored.id = None;
        let payload = serde_json::to_string(&stored)?;

        let (disease, severity) = match &record.detection {
            Some(d) => (Some(d.disease_label.as_str()), Some(d.severity)),
            None => (None, None),
        };
        let executed = record.actuation.as_ref().map(|a| a.executed);

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO run_records
                (run_id, status, failed_stage, timestamp, payload, disease_label, severity, action, executed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                record.run_id.to_string(),
                if record.is_success() { "success" } else { "failed" },
                record.failed_stage.as_ref().map(RunStage::as_str),
                record.timestamp.to_rfc3339(),
                payload,
                disease,
                severity,
                record.decision.action.as_str(),
                executed,
            ],
        )
        .map_err(|e| CoreError::Storage(format!("실행 기록 저장 실패: {e}")))?;

        let id = conn.last_insert_rowid();
        debug!("실행 기록 저장: id={id}, run_id={}", record.run_id);
        Ok(id)
    }

    async fn list_recent(&self, n: usize) -> Result<Vec<RunRecord>, CoreError> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached("SELECT id, payload FROM run_records ORDER BY id DESC LIMIT ?1")
            .map_err(|e| CoreError::Storage(format!("쿼리 준비 실패: {e}")))?;

        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(rusqlite::params![limit], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| CoreError::Storage(format!("실행 기록 조회 실패: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, payload) =
                row.map_err(|e| CoreError::Storage(format!("행 읽기 실패: {e}")))?;
            let mut record = serde_json::from_str::<RunRecord>(&payload).map_err(|e| {
                error!("실행 기록 역직렬화 실패 (id={id}): {e}");
                CoreError::from(e)
            })?;
            record.id = Some(id);
            records.push(record);
        }

        Ok(records)
    }

    async fn count(&self) -> Result<u64, CoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM run_records", [], |row| row.get(0))
            .map_err(|e| CoreError::Storage(format!("실행 기록 수 조회 실패: {e}")))?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use leafguard_core::models::actuation::{ActuationOutcome, ActuationTarget};
    use leafguard_core::models::decision::{Decision, SeverityTier};
    use leafguard_core::models::detection::{BackendKind, DetectionResult};
    use leafguard_core::models::run::RunStatus;
    use tokio_test::block_on;
    use uuid::Uuid;

    fn success_record(label: &str, severity: f64) -> RunRecord {
        let decision = Decision::spray(2_000, SeverityTier::Low);
        RunRecord {
            id: None,
            run_id: Uuid::new_v4(),
            status: RunStatus::Success,
            failed_stage: None,
            failure_reason: None,
            capture: None,
            detection: Some(
                DetectionResult::new(
                    label,
                    severity,
                    BackendKind::Mock,
                    serde_json::json!({"simulated": true}),
                )
                .unwrap(),
            ),
            decision,
            actuation: Some(ActuationOutcome::executed(
                decision,
                ActuationTarget::LocalGpio,
                None,
                2_003,
            )),
            elapsed_ms: 2_100,
            timestamp: Utc::now(),
        }
    }

    fn failed_record(stage: RunStage) -> RunRecord {
        RunRecord {
            id: None,
            run_id: Uuid::new_v4(),
            status: RunStatus::Failed,
            failed_stage: Some(stage),
            failure_reason: Some("camera not found: /dev/video0".to_string()),
            capture: None,
            detection: None,
            decision: Decision::off(),
            actuation: None,
            elapsed_ms: 4,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn append_assigns_increasing_ids() {
        let log = SqliteRunLog::open_in_memory().unwrap();
        block_on(async {
            let a = log.append(&success_record("rust", 42.0)).await.unwrap();
            let b = log.append(&failed_record(RunStage::Capture)).await.unwrap();
            let c = log.append(&success_record("blight", 80.0)).await.unwrap();
            assert!(a < b && b < c);
            assert_eq!(log.count().await.unwrap(), 3);
        });
    }

    #[test]
    fn list_recent_returns_newest_first() {
        let log = SqliteRunLog::open_in_memory().unwrap();
        block_on(async {
            for i in 0..5 {
                log.append(&success_record("rust", 30.0 + f64::from(i)))
                    .await
                    .unwrap();
            }

            let recent = log.list_recent(3).await.unwrap();
            assert_eq!(recent.len(), 3);
            let severities: Vec<f64> = recent
                .iter()
                .map(|r| r.detection.as_ref().unwrap().severity)
                .collect();
            assert_eq!(severities, vec![34.0, 33.0, 32.0]);
            assert!(recent[0].id > recent[1].id);
        });
    }

    #[test]
    fn list_recent_more_than_stored() {
        let log = SqliteRunLog::open_in_memory().unwrap();
        block_on(async {
            log.append(&success_record("mildew", 50.0)).await.unwrap();
            assert_eq!(log.list_recent(10).await.unwrap().len(), 1);
            assert!(log.list_recent(0).await.unwrap().is_empty());
        });
    }

    #[test]
    fn empty_log() {
        let log = SqliteRunLog::open_in_memory().unwrap();
        block_on(async {
            assert!(log.list_recent(10).await.unwrap().is_empty());
            assert_eq!(log.count().await.unwrap(), 0);
        });
    }

    #[test]
    fn record_round_trips_with_assigned_id() {
        let log = SqliteRunLog::open_in_memory().unwrap();
        let original = failed_record(RunStage::Detection);
        block_on(async {
            let id = log.append(&original).await.unwrap();
            let stored = log.list_recent(1).await.unwrap().remove(0);

            let mut expected = original.clone();
            expected.id = Some(id);
            assert_eq!(stored, expected);
            assert_eq!(stored.failed_stage, Some(RunStage::Detection));
            assert!(stored.actuation.is_none());
        });
    }

    #[test]
    fn duplicate_run_id_is_rejected() {
        let log = SqliteRunLog::open_in_memory().unwrap();
        let record = success_record("rust", 42.0);
        block_on(async {
            log.append(&record).await.unwrap();
            let err = log.append(&record).await.unwrap_err();
            assert_matches!(err, CoreError::Storage(_));
            assert_eq!(log.count().await.unwrap(), 1);
        });
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("leafguard.db");

        let first = success_record("leaf spot", 55.5);
        {
            let log = SqliteRunLog::open(&path).unwrap();
            block_on(log.append(&first)).unwrap();
            block_on(log.append(&failed_record(RunStage::Capture))).unwrap();
        }

        let reopened = SqliteRunLog::open(&path).unwrap();
        block_on(async {
            assert_eq!(reopened.count().await.unwrap(), 2);
            let recent = reopened.list_recent(2).await.unwrap();
            assert_eq!(recent[1].run_id, first.run_id);
            assert_eq!(recent[1].detection.as_ref().unwrap().disease_label, "leaf spot");
            assert_eq!(recent[0].status, RunStatus::Failed);
        });
    }

    #[test]
    fn corrupt_payload_is_a_serialization_error() {
        let log = SqliteRunLog::open_in_memory().unwrap();
        block_on(log.append(&success_record("rust", 30.0))).unwrap();
        log.lock()
            .unwrap()
            .execute(
                "INSERT INTO run_records (run_id, status, timestamp, payload)
                 VALUES ('broken', 'success', '2026-01-01T00:00:00Z', '{not json')",
                [],
            )
            .unwrap();

        block_on(async {
            let err = log.list_recent(10).await.unwrap_err();
            assert_matches!(err, CoreError::Serialization(_));
            assert_eq!(log.count().await.unwrap(), 2);
        });
    }
}
